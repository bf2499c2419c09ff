// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of pairing codes.

use async_trait::async_trait;
use atendente_bus::{BusEvent, EventBus, EventSubscriber};
use atendente_core::AtendenteError;
use qrcode::QrCode;
use qrcode::render::unicode;
use tracing::{info, warn};

/// Renders `code` as a QR block made of half-height unicode cells.
pub fn render_qr(code: &str) -> Result<String, AtendenteError> {
    let qr = QrCode::new(code.as_bytes())
        .map_err(|e| AtendenteError::Internal(format!("pairing code does not fit a QR code: {e}")))?;
    Ok(qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Prints every pairing code published on the bus as a scannable QR code.
pub struct PairingCodePrinter;

#[async_trait]
impl EventSubscriber for PairingCodePrinter {
    fn name(&self) -> &str {
        "pairing-printer"
    }

    async fn on_event(&self, _bus: &EventBus, event: &BusEvent) {
        let BusEvent::PairingCodeAvailable { session_id, code } = event else {
            return;
        };
        match render_qr(code) {
            Ok(qr) => {
                info!(session_id = %session_id, "pairing code issued, scan it to link the account");
                eprintln!("\nsession {session_id}\n{qr}");
            }
            Err(e) => warn!(session_id = %session_id, error = %e, "failed to render pairing code"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_square_block() {
        let qr = render_qr("2@Zm9v,YmFy,YmF6").unwrap();
        let lines: Vec<&str> = qr.lines().collect();
        assert!(lines.len() > 10);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn oversized_code_is_an_error() {
        let code = "x".repeat(8000);
        assert!(render_qr(&code).is_err());
    }
}
