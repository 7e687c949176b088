use std::io::Write;

use anyhow::Result;
use tabwriter::TabWriter;

use crate::store::WebhookEventRecord;

pub fn print_events<T: std::io::Write>(wr: T, events: &[WebhookEventRecord]) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(
        tw,
        "Processed At\tWebhook ID\tType\tProcess\tCode\tLink ID\tRequest ID\tErrors"
    )?;

    for event in events.iter() {
        writeln!(
            tw,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            event.processed_at,
            event.webhook_id,
            event.webhook_type,
            event.process_type,
            event.webhook_code,
            event.link_id,
            or_dash(&event.request_id),
            event.error_details.as_deref().unwrap_or("-"),
        )?;
    }

    tw.flush()?;

    Ok(())
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}
