use std::io::Write;

use anyhow::Context;
use libmotif::structs::Motif;
use serde::Serialize;

use crate::pipeline::{MotifSlot, RecordState};

/// One line of the motif file.
#[derive(Serialize)]
struct MotifLine<'a> {
    index: usize,
    label: &'a str,
    state: RecordState,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    motif: &'a Motif,
}

/// Write every slot as one JSON object per line, in input order.
///
/// Skipped and failed records are written too, with their empty motif.
pub fn write_motifs(slots: &[MotifSlot], writer: &mut impl Write) -> anyhow::Result<()> {
    for (index, slot) in slots.iter().enumerate() {
        let line = MotifLine {
            index,
            label: &slot.label,
            state: slot.state,
            error: slot.error.as_deref(),
            motif: &slot.motif,
        };

        serde_json::to_writer(&mut *writer, &line)
            .with_context(|| format!("failed to serialize motif for {}", slot.label))?;
        writeln!(writer).context("failed to write motif")?;
    }

    writer.flush().context("failed to flush motif output")
}
