use tabled::settings::Style;
use tabled::{Table, Tabled};
use termtree::Tree;

use snowform::plan::{Plan, PlanEntry};
use snowform::protocol::{AttributeSchema, ProviderSchema, TypeSchema};
use snowform::value::Value;

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Attribute")]
    attribute: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Before")]
    before: String,
    #[tabled(rename = "After")]
    after: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

fn show(value: Option<&Value>) -> String {
    value.map(ToString::to_string).unwrap_or_else(|| "-".into())
}

impl From<&PlanEntry> for PlanRow {
    fn from(entry: &PlanEntry) -> Self {
        let mut notes = Vec::new();
        if entry.rename {
            notes.push("rename".to_string());
        }
        if entry.defer_to_remote {
            notes.push("remote default".to_string());
        }
        if let Some(level) = entry.level {
            notes.push(format!("level {level:?}").to_lowercase());
        }
        if let Some(drift) = &entry.drift {
            notes.push(format!(
                "drift: {} -> {}",
                show(drift.recorded.as_ref()),
                show(drift.observed.as_ref())
            ));
        }
        let after = if entry.defer_to_remote && entry.after.is_none() {
            "(known after apply)".to_string()
        } else {
            show(entry.after.as_ref())
        };
        Self {
            attribute: entry.attribute.clone(),
            action: entry.action.to_string(),
            before: show(entry.before.as_ref()),
            after,
            notes: notes.join("; "),
        }
    }
}

/// Header line plus the changed entries; unchanged ones are left out.
pub fn render_plan(plan: &Plan) -> String {
    let mut out = format!(
        "{} {} ({})\n",
        plan.resource_type, plan.identifier, plan.action
    );
    if let Some(prior) = &plan.prior_identifier
        && prior != &plan.identifier
    {
        out.push_str(&format!("  was {prior}\n"));
    }
    let rows: Vec<PlanRow> = plan
        .entries
        .iter()
        .filter(|e| e.is_change() || e.drift.is_some())
        .map(PlanRow::from)
        .collect();
    if rows.is_empty() {
        out.push_str("No changes.\n");
    } else {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        out.push_str(&table.to_string());
        out.push('\n');
    }
    for diagnostic in plan.diagnostics.iter() {
        out.push_str(&format!("{:?}: {}\n", diagnostic.severity, diagnostic.summary));
    }
    out
}

#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    ty: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn mode(attr: &AttributeSchema) -> String {
    let mut mode = if attr.required {
        "required".to_string()
    } else if attr.optional && attr.computed {
        "optional, computed".to_string()
    } else if attr.optional {
        "optional".to_string()
    } else {
        "computed".to_string()
    };
    if attr.sensitive {
        mode.push_str(", sensitive");
    }
    mode
}

fn attribute_rows(attributes: &[AttributeSchema], prefix: &str, rows: &mut Vec<AttributeRow>) {
    for attr in attributes {
        let name = format!("{prefix}{}", attr.name);
        let ty = match &attr.nested {
            Some(nested) => format!("{:?}(object)", nested.nesting).to_lowercase(),
            None => attr.ty.clone(),
        };
        rows.push(AttributeRow {
            name: name.clone(),
            ty,
            mode: mode(attr),
            description: attr.description.clone(),
        });
        if let Some(nested) = &attr.nested {
            attribute_rows(&nested.attributes, &format!("{name}."), rows);
        }
    }
}

pub fn render_type(type_name: &str, schema: &TypeSchema) -> String {
    let mut rows = Vec::new();
    attribute_rows(&schema.block.attributes, "", &mut rows);
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    format!(
        "{type_name} (version {})\n{}\n{table}\n",
        schema.version, schema.description
    )
}

/// Tree of every type the provider serves.
pub fn render_schema(schema: &ProviderSchema) -> String {
    let leaves = |types: &std::collections::BTreeMap<String, TypeSchema>| {
        types
            .iter()
            .map(|(name, s)| {
                Tree::new(format!("{name} ({} attributes)", s.block.attributes.len()))
            })
            .collect::<Vec<_>>()
    };
    let provider = Tree::new(format!(
        "provider ({} attributes)",
        schema.provider.attributes.len()
    ));
    let tree = Tree::new("snowform".to_string())
        .with_leaves([
            provider,
            Tree::new("resources".to_string()).with_leaves(leaves(&schema.resources)),
            Tree::new("data sources".to_string()).with_leaves(leaves(&schema.data_sources)),
        ]);
    tree.to_string()
}
