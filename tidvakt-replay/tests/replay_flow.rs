//! End-to-end: install at a recording's capture time, let virtual time pass,
//! and replay saved responses through the virtualizer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tidvakt_config::{TidvaktConfig, TimestampConfig};
use tidvakt_core::VirtualClock;
use tidvakt_replay::{CapturedInteraction, TimestampVirtualizer};

const CAPTURED: &str = "2024-03-10T09:00:00.000Z";

fn session_body() -> String {
    format!(r#"{{"id":"s-1","issuedAt":"{CAPTURED}","expiresAt":"2024-03-10T10:00:00.000Z","birthDate":"1990-01-01T00:00:00Z"}}"#)
}

#[tokio::test]
async fn expiring_session_stays_consistent_with_virtual_time() {
    let mut config = TidvaktConfig::default();
    config.timestamps.exclude_keys = vec!["birthDate".into()];

    let clock = VirtualClock::new(config.clock.clone());
    clock.install(CAPTURED).unwrap();
    let virtualizer = TimestampVirtualizer::new(clock.clone(), &config.timestamps);
    let interaction = CapturedInteraction::from_har_entry(&serde_json::json!({
        "startedDateTime": CAPTURED,
        "response": { "content": { "text": session_body() } }
    }))
    .unwrap();

    // No time has passed: replay is byte-identical.
    assert_eq!(virtualizer.replay(&interaction), session_body());

    // A refresh timer the client would have armed for the expiry.
    let refreshed = Arc::new(AtomicUsize::new(0));
    let r = refreshed.clone();
    clock
        .set_timeout("1 hour", move || async move {
            r.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    clock.advance("59 minutes").await.unwrap();
    assert_eq!(refreshed.load(Ordering::SeqCst), 0);
    let body = virtualizer.replay(&interaction);
    assert!(body.contains(r#""issuedAt":"2024-03-10T09:59:00.000Z""#));
    assert!(body.contains(r#""expiresAt":"2024-03-10T10:59:00.000Z""#));
    assert!(body.contains(r#""birthDate":"1990-01-01T00:00:00Z""#));

    clock.advance("1 minute").await.unwrap();
    assert_eq!(refreshed.load(Ordering::SeqCst), 1);

    clock.uninstall();
    assert_eq!(virtualizer.replay(&interaction), session_body());
}

#[tokio::test]
async fn global_clock_is_shared_by_every_handle() {
    let clock = VirtualClock::global();
    clock.install(CAPTURED).unwrap();
    let virtualizer = TimestampVirtualizer::new(clock.clone(), &TimestampConfig::default());

    VirtualClock::global().advance("2 days").await.unwrap();
    assert_eq!(
        virtualizer.rewrite(&format!("Last-Modified: {CAPTURED}"), CAPTURED),
        "Last-Modified: 2024-03-12T09:00:00.000Z"
    );

    assert!(VirtualClock::global().install(CAPTURED).is_err());
    clock.uninstall();
    assert!(!VirtualClock::global().is_installed());
}
