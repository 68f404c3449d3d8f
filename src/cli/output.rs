use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Print `payload` as JSON or YAML; human output is rendered by the caller
pub fn emit_structured<T: Serialize>(payload: &T, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputFormat::Yaml => print!("{}", to_yaml(payload)?),
        OutputFormat::Human => {}
    }
    Ok(())
}

/// YAML with enums as single-key maps, the same shape workflow files use
pub fn to_yaml<T: Serialize>(payload: &T) -> Result<String> {
    let mut buffer = Vec::new();
    {
        let mut serializer = serde_yaml::Serializer::new(&mut buffer);
        serde_yaml::with::singleton_map_recursive::serialize(payload, &mut serializer)?;
    }
    Ok(String::from_utf8(buffer)?)
}
