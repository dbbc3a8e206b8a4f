use anyhow::Result;

fn main() -> Result<()> {
    let code = town_cli::main_entry()?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
