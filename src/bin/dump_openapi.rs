use std::fs;

fn main() -> anyhow::Result<()> {
    let doc = shift_planner::docs::build_openapi(8000)?;
    let s = serde_json::to_string_pretty(&doc)?;
    let path = "/tmp/shift-planner-openapi.json";
    fs::write(path, s)?;
    println!("wrote {}", path);
    Ok(())
}
