//! Rendering of history snapshots
//!
//! The HTML page mirrors the device's control panel. The body buffer is
//! sized up front with a fallible reservation, so a failed allocation
//! becomes an error response instead of an abort.

use std::collections::TryReserveError;
use std::fmt::Write;

use canmon_core::{FilterPolicy, HistoryEntry, StatusLabel};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Fixed markup and script around the list
const PAGE_OVERHEAD: usize = 1024;

/// Markup per list item, excluding payload bytes
const ENTRY_OVERHEAD: usize = 64;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to allocate {bytes} bytes for the response body: {source}")]
    Allocation {
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("Failed to format the response body: {0}")]
    Format(#[from] std::fmt::Error),
}

fn estimated_len(entries: &[HistoryEntry]) -> usize {
    entries.iter().fold(PAGE_OVERHEAD, |acc, e| {
        acc + ENTRY_OVERHEAD + 3 * e.record.frame().data().len()
    })
}

fn heading(policy: FilterPolicy) -> &'static str {
    match policy {
        FilterPolicy::Gated => "Filtered 0x762 Messages (byte0=0x23, byte1=0x00)",
        FilterPolicy::AcceptAll => "Received 0x762 Messages",
    }
}

/// Render the control panel page for a snapshot, oldest entry first
pub fn render_page(entries: &[HistoryEntry], policy: FilterPolicy) -> Result<String, RenderError> {
    let bytes = estimated_len(entries);
    let mut page = String::new();
    page.try_reserve(bytes)
        .map_err(|source| RenderError::Allocation { bytes, source })?;

    write_page(&mut page, entries, policy)?;
    Ok(page)
}

fn write_page(
    out: &mut String,
    entries: &[HistoryEntry],
    policy: FilterPolicy,
) -> std::fmt::Result {
    out.push_str("<html><body>");
    out.push_str("<h1>TWAI Control Panel</h1>");
    out.push_str("<button onclick='sendMessages()'>Send 0x742 Messages</button>");
    out.push_str("<div id='status'></div>");
    write!(out, "<h2>{}</h2><ul id='messageList'>", heading(policy))?;

    for entry in entries {
        let frame = entry.record.frame();
        write!(out, "<li>ID: 0x{:03X}, Data: ", frame.id())?;
        for byte in frame.data() {
            write!(out, "{:02X} ", byte)?;
        }
        match entry.record.status() {
            Some(status) => write!(out, ", Status: {}</li>", status)?,
            None => out.push_str("</li>"),
        }
    }

    out.push_str("</ul>");
    out.push_str("<script>");
    out.push_str("function sendMessages() {");
    out.push_str("  fetch('/send', { method: 'POST' })");
    out.push_str("    .then(response => { if (!response.ok) throw new Error(response.status); return response.text(); })");
    out.push_str("    .then(data => {");
    out.push_str("      document.getElementById('status').innerHTML = '<p>Messages sent successfully</p>';");
    out.push_str("      setTimeout(() => location.reload(), 1000);");
    out.push_str("    })");
    out.push_str("    .catch(error => {");
    out.push_str("      console.error('Error:', error);");
    out.push_str("      document.getElementById('status').innerHTML = '<p>Error sending messages</p>';");
    out.push_str("    });");
    out.push_str("}");
    out.push_str("setInterval(() => location.reload(), 5000);");
    out.push_str("</script>");
    out.push_str("</body></html>");
    Ok(())
}

/// JSON form of the history
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub capacity: usize,
    pub policy: FilterPolicy,
    pub count: usize,
    pub messages: Vec<MessageView>,
}

/// One stored response frame
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub seq: u64,
    /// Identifier in hex, e.g. "0x762"
    pub id: String,
    pub dlc: u8,
    /// Payload as compact hex, e.g. "23008801"
    pub data: String,
    pub status: Option<StatusLabel>,
    pub received_at: DateTime<Utc>,
}

impl From<&HistoryEntry> for MessageView {
    fn from(entry: &HistoryEntry) -> Self {
        let frame = entry.record.frame();
        Self {
            seq: entry.seq,
            id: format!("0x{:03X}", frame.id()),
            dlc: frame.dlc(),
            data: frame.compact_hex(),
            status: entry.record.status(),
            received_at: entry.received_at,
        }
    }
}

impl HistoryResponse {
    pub fn new(entries: &[HistoryEntry], capacity: usize, policy: FilterPolicy) -> Self {
        Self {
            capacity,
            policy,
            count: entries.len(),
            messages: entries.iter().map(MessageView::from).collect(),
        }
    }
}
