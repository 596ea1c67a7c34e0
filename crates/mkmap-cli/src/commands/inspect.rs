use crate::cli::InspectArgs;
use crate::error::Result;
use mkmap::core::io::model_file::ModelDefinition;
use tracing::info;

pub fn run(args: InspectArgs) -> Result<()> {
    info!("Loading reaction model from {:?}", &args.model);
    let definition = ModelDefinition::load(&args.model)?;
    print!("{}", describe(&definition));
    Ok(())
}

fn describe(definition: &ModelDefinition) -> String {
    let model = &definition.model;
    let mut out = String::new();

    out.push_str(&format!(
        "Descriptors ({}): {}\n",
        definition.dimension(),
        definition.descriptor_names.join(", ")
    ));

    out.push_str(&format!("Sites ({}):\n", model.sites().len()));
    for site in model.sites() {
        let closed = model
            .find_site(&site.name)
            .is_some_and(|id| model.is_site_closed(id));
        out.push_str(&format!(
            "  {} (capacity {}){}\n",
            site.name,
            site.capacity,
            if closed { " [closed]" } else { "" }
        ));
    }

    out.push_str(&format!(
        "Adsorbates ({}): {}\n",
        model.adsorbates().len(),
        model.adsorbate_names().join(", ")
    ));
    out.push_str(&format!(
        "Gases ({}): {}\n",
        model.gases().len(),
        model.gas_names().join(", ")
    ));

    out.push_str(&format!("Steps ({}):\n", model.steps().len()));
    for step in model.steps() {
        out.push_str(&format!(
            "  {}{}\n",
            step.name,
            if step.transition_state.is_some() {
                " [TS]"
            } else {
                ""
            }
        ));
    }
    out
}
