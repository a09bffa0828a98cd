//! `offerdesk tools`: Print the tool catalog.

use offerdesk_core::tool::ToolDeclaration;
use offerdesk_tools::catalog;

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let schemas: Vec<_> = catalog()
            .iter()
            .map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "description": d.description,
                    "parameters": d.parameters_schema(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    for decl in catalog() {
        println!("{}", render(decl));
    }
    Ok(())
}

fn render(decl: &ToolDeclaration) -> String {
    let args: Vec<_> = decl
        .parameters
        .iter()
        .map(|p| if p.required { format!("{}*", p.name) } else { p.name.clone() })
        .collect();
    format!("{}({})\n    {}\n", decl.name, args.join(", "), decl.description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_arguments_are_starred() {
        let decl = catalog().iter().find(|d| d.name == "ask_question").unwrap();
        assert!(render(decl).starts_with("ask_question(offer_id*, field*, question*)"));
    }
}
