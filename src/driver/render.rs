use std::io::{self, Write};

use crate::types::GenerationResult;

const DELIMITER: &str = "----------------------------------------";
const NO_RESULTS_NOTICE: &str = "no results";

/// Write results to `out`, each prompt separated from its completion by a
/// fixed delimiter line. An empty slice produces exactly one notice line, so
/// a degraded or halted-before-progress run still says something.
pub fn render_results<W: Write>(results: &[GenerationResult], out: &mut W) -> io::Result<()> {
    if results.is_empty() {
        writeln!(out, "{}", NO_RESULTS_NOTICE)?;
        return Ok(());
    }

    for result in results {
        writeln!(out, "Prompt: {}", result.prompt)?;
        writeln!(out, "{}", DELIMITER)?;
        writeln!(out, "{}", result.text.trim())?;
        writeln!(out)?;
    }
    Ok(())
}
