use anyhow::Result;

fn main() -> Result<()> {
    domgen_cli::main_entry()
}
