use serde::Deserialize;

/// The JSON document `slim xray --changes-output report` writes to its
/// `--report` path. Only `image_stack` and each instruction's `command_all`
/// are required; everything else is carried metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SlimReport {
    pub image_stack: Vec<ImageStackEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImageStackEntry {
    pub is_top_image: bool,
    pub id: String,
    pub full_name: String,
    pub repo_name: String,
    pub version_tag: String,
    pub raw_tags: Vec<String>,
    pub create_time: Option<String>,
    pub new_size: i64,
    pub new_size_human: String,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Instruction {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub is_nop: bool,
    #[serde(default)]
    pub local_image_exists: bool,
    #[serde(default)]
    pub layer_index: i64,
    #[serde(default)]
    pub layer_id: String,
    #[serde(default)]
    pub layer_fsdiff_id: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub size_human: Option<String>,
    #[serde(default)]
    pub params: Option<String>,
    #[serde(default)]
    pub command_snippet: String,
    pub command_all: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub is_exec_form: bool,
    #[serde(default)]
    pub empty_layer: bool,
    #[serde(default)]
    pub system_commands: Vec<String>,
    #[serde(default)]
    pub is_last_instruction: bool,
    #[serde(default)]
    pub raw_tags: Vec<String>,
}

pub fn parse_report(raw: &[u8]) -> Result<SlimReport, serde_json::Error> {
    serde_json::from_slice(raw)
}

/// Every instruction contributes exactly one line, in stack order then
/// instruction order. Nop and empty-layer instructions are kept.
pub fn reconstruct_dockerfile(report: &SlimReport) -> String {
    let mut dockerfile = String::new();
    for instruction in report
        .image_stack
        .iter()
        .flat_map(|entry| entry.instructions.iter())
    {
        dockerfile.push_str(instruction.command_all.as_str());
        dockerfile.push('\n');
    }
    dockerfile
}
