use std::time::Duration;

use tracing::debug;

const COLLECTOR_URL: &str = "http://collector.singer.io/i";
const COLLECTOR_TIMEOUT: Duration = Duration::from_secs(10);
const TARGET_NAME: &str = "target-google-pubsub";

fn usage_url(version: &str) -> String {
    format!("{COLLECTOR_URL}?e=se&aid=singer&se_ca={TARGET_NAME}&se_ac=open&se_la={version}")
}

/// Reports an anonymous "target opened" event in the background.
///
/// The task is detached: nothing awaits it, every failure is swallowed, and it
/// is dropped with the runtime when the process exits.
pub fn spawn_usage_stats(version: &'static str) {
    tokio::spawn(async move {
        if let Err(err) = send_usage_stats(version).await {
            debug!("collection request failed: {err}");
        }
    });
}

async fn send_usage_stats(version: &str) -> Result<(), reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(COLLECTOR_TIMEOUT)
        .build()?;
    client.get(usage_url(version)).send().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_url_carries_snowplow_event_parameters() {
        assert_eq!(
            usage_url("0.1.0"),
            "http://collector.singer.io/i?e=se&aid=singer&se_ca=target-google-pubsub&se_ac=open&se_la=0.1.0"
        );
    }
}
