use std::path::PathBuf;

use clap::{Parser, Subcommand};

use snowform::value::{Config, Value};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the provider protocol as NDJSON over stdio
    Serve(ServeArgs),
    /// Print the schema of every type, or the attributes of one
    Schema(SchemaArgs),
    /// Compute a plan for one instance
    Plan(PlanArgs),
    /// Import an existing object and print its state
    Import(ImportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConnectionArgs {
    #[arg(long, env = "SNOWFLAKE_PROFILE")]
    pub profile: Option<String>,

    #[arg(long, env = "SNOWFLAKE_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Preview feature to enable; may be repeated
    #[arg(long = "preview-feature", value_name = "FEATURE")]
    pub preview_features: Vec<String>,

    /// Run against an in-process sandbox instead of Snowflake
    #[arg(long)]
    pub offline: bool,
}

impl ConnectionArgs {
    /// Provider configuration carrying only what was given on the command line.
    pub fn provider_config(&self) -> Config {
        let mut config = Config::new();
        if let Some(profile) = &self.profile {
            config = config.with("profile", profile.as_str());
        }
        if let Some(path) = &self.config_path {
            config = config.with("config_path", path.display().to_string());
        }
        if !self.preview_features.is_empty() {
            let features = self
                .preview_features
                .iter()
                .map(|f| Value::from(f.as_str()))
                .collect::<Vec<_>>();
            config = config.with("preview_features_enabled", features);
        }
        config
    }
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(clap::Args, Debug)]
pub struct SchemaArgs {
    /// Resource or data source type
    pub type_name: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PlanArgs {
    #[arg(long = "type")]
    pub type_name: String,

    /// JSON instance configuration; `null` members are explicit nulls
    #[arg(long)]
    pub config: PathBuf,

    /// JSON state from a previous apply
    #[arg(long)]
    pub state: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    #[arg(long = "type")]
    pub type_name: String,

    /// Pipe-delimited identifier, e.g. `DB|SCHEMA|NAME`
    #[arg(long)]
    pub id: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    #[test]
    fn test_plan_args_from_flags() {
        let cli = Cli::parse_from([
            "snowform",
            "plan",
            "--type=snowflake_warehouse",
            "--config=wh.json",
            "--state=wh.state.json",
            "--offline",
        ]);

        if let Command::Plan(args) = cli.command {
            assert_eq!(args.type_name, "snowflake_warehouse");
            assert_eq!(args.config, PathBuf::from("wh.json"));
            assert_eq!(args.state, Some(PathBuf::from("wh.state.json")));
            assert!(args.connection.offline);
        } else {
            panic!("Expected Plan command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_import_args_id_is_kept_verbatim() {
        let cli = Cli::parse_from([
            "snowform",
            "import",
            "--type",
            "snowflake_masking_policy",
            "--id",
            "DB|PUBLIC|MASK",
        ]);

        if let Command::Import(args) = cli.command {
            assert_eq!(args.id, "DB|PUBLIC|MASK");
        } else {
            panic!("Expected Import command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_schema_type_is_optional() {
        let cli = Cli::parse_from(["snowform", "schema"]);
        if let Command::Schema(args) = cli.command {
            assert!(args.type_name.is_none());
        } else {
            panic!("Expected Schema command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_preview_features_reach_provider_config() {
        let cli = Cli::parse_from([
            "snowform",
            "serve",
            "--preview-feature=snowflake_compute_pool_resource",
            "--preview-feature=snowflake_compute_pools_datasource",
        ]);

        if let Command::Serve(args) = cli.command {
            let config = args.connection.provider_config();
            let features = config.get("preview_features_enabled").as_set().cloned();
            assert_eq!(
                features,
                Some(Value::List(vec![
                    Value::from("snowflake_compute_pool_resource"),
                    Value::from("snowflake_compute_pools_datasource"),
                ]))
            );
        } else {
            panic!("Expected Serve command, got {:?}", cli.command);
        }
    }

    #[test]
    #[serial]
    fn test_profile_from_env_var_fallback() {
        let backup = std::env::var("SNOWFLAKE_PROFILE").ok();

        unsafe {
            std::env::set_var("SNOWFLAKE_PROFILE", "ci");
        }

        let cli = Cli::parse_from(["snowform", "serve"]);

        unsafe {
            match backup {
                Some(profile) => std::env::set_var("SNOWFLAKE_PROFILE", profile),
                None => std::env::remove_var("SNOWFLAKE_PROFILE"),
            }
        }

        if let Command::Serve(args) = cli.command {
            assert_eq!(args.connection.profile, Some("ci".to_string()));
            assert_eq!(
                args.connection.provider_config().get_str("profile"),
                Some("ci")
            );
        } else {
            panic!("Expected Serve command, got {:?}", cli.command);
        }
    }

    #[test]
    #[serial]
    fn test_profile_flag_takes_precedence_over_env() {
        let backup = std::env::var("SNOWFLAKE_PROFILE").ok();

        unsafe {
            std::env::set_var("SNOWFLAKE_PROFILE", "env_profile");
        }

        let cli = Cli::parse_from(["snowform", "serve", "--profile=cli_profile"]);

        unsafe {
            match backup {
                Some(profile) => std::env::set_var("SNOWFLAKE_PROFILE", profile),
                None => std::env::remove_var("SNOWFLAKE_PROFILE"),
            }
        }

        if let Command::Serve(args) = cli.command {
            assert_eq!(args.connection.profile, Some("cli_profile".to_string()));
        } else {
            panic!("Expected Serve command, got {:?}", cli.command);
        }
    }

    #[test]
    #[serial]
    fn test_no_connection_flags_provided() {
        let profile_backup = std::env::var("SNOWFLAKE_PROFILE").ok();
        let path_backup = std::env::var("SNOWFLAKE_CONFIG_PATH").ok();
        unsafe {
            std::env::remove_var("SNOWFLAKE_PROFILE");
            std::env::remove_var("SNOWFLAKE_CONFIG_PATH");
        }

        let cli = Cli::parse_from(["snowform", "serve"]);

        unsafe {
            if let Some(profile) = profile_backup {
                std::env::set_var("SNOWFLAKE_PROFILE", profile);
            }
            if let Some(path) = path_backup {
                std::env::set_var("SNOWFLAKE_CONFIG_PATH", path);
            }
        }

        if let Command::Serve(args) = cli.command {
            assert!(args.connection.profile.is_none());
            assert!(args.connection.config_path.is_none());
            assert!(args.connection.provider_config().names().next().is_none());
        } else {
            panic!("Expected Serve command, got {:?}", cli.command);
        }
    }
}
