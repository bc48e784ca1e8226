use anyhow::Result;
use colored::*;
use std::time::{Duration, Instant};

use crate::api_client::ApiClient;
use crate::output::{print_event, TestResult};
use crate::sse_client::Connection;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn new_thread_id() -> String {
    format!("thread_{}", uuid::Uuid::new_v4().simple())
}

/// Attach, post one event, and expect it on the stream.
pub async fn test_connection(api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "connection_test";

    println!("\n{}", "=== TEST: Connection ===".bright_cyan().bold());

    let thread_id = new_thread_id();
    let mut sse = Connection::establish(&api_client.stream_url(&thread_id), "first".to_string())?;
    println!("{} Stream opened for {}", "✓".green(), thread_id);

    api_client.post_event(&thread_id, "ping").await?;
    println!("{} Posted \"ping\"", "→".blue());

    let result = match sse.wait_for_data(EVENT_TIMEOUT).await {
        Ok(event) if event.data == "ping" => {
            print_event(&sse.label, &event);
            TestResult::pass(scenario, start.elapsed())
        }
        Ok(event) => TestResult::fail(
            scenario,
            format!("Expected \"ping\", got {:?}", event.data),
            start.elapsed(),
        ),
        Err(e) => TestResult::fail(scenario, format!("{e}"), start.elapsed()),
    };

    api_client.close_thread(&thread_id).await?;
    Ok(result)
}

/// Events posted before anyone attaches are delivered in order on attach.
pub async fn test_buffered_delivery(api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "buffered_delivery";

    println!("\n{}", "=== TEST: Buffered Delivery ===".bright_cyan().bold());

    let thread_id = new_thread_id();
    let expected = ["one", "two", "three"];
    for payload in expected {
        api_client.post_event(&thread_id, payload).await?;
    }
    println!(
        "{} Posted {} events to {} with nobody attached",
        "→".blue(),
        expected.len(),
        thread_id
    );

    let mut sse = Connection::establish(&api_client.stream_url(&thread_id), "first".to_string())?;

    let mut received = Vec::new();
    for _ in expected {
        match sse.wait_for_data(EVENT_TIMEOUT).await {
            Ok(event) => {
                print_event(&sse.label, &event);
                received.push(event.data);
            }
            Err(e) => {
                api_client.close_thread(&thread_id).await?;
                return Ok(TestResult::fail(
                    scenario,
                    format!("After {:?}: {e}", received),
                    start.elapsed(),
                ));
            }
        }
    }

    api_client.close_thread(&thread_id).await?;

    if received == expected {
        Ok(TestResult::pass(scenario, start.elapsed()))
    } else {
        Ok(TestResult::fail(
            scenario,
            format!("Expected {:?}, got {:?}", expected, received),
            start.elapsed(),
        ))
    }
}

/// A second attach ends the first stream and receives subsequent events.
pub async fn test_reconnect(api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "reconnect";

    println!("\n{}", "=== TEST: Reconnect ===".bright_cyan().bold());

    let thread_id = new_thread_id();
    let url = api_client.stream_url(&thread_id);

    let mut first = Connection::establish(&url, "first".to_string())?;
    api_client.post_event(&thread_id, "ready").await?;
    if let Err(e) = first.wait_for_data(EVENT_TIMEOUT).await {
        api_client.close_thread(&thread_id).await?;
        return Ok(TestResult::fail(
            scenario,
            format!("First stream never attached: {e}"),
            start.elapsed(),
        ));
    }
    println!("{} First stream attached", "✓".green());

    let mut second = Connection::establish(&url, "second".to_string())?;
    println!(
        "{} Opened second stream, waiting for the first to end...",
        "→".blue()
    );

    if let Err(e) = first.wait_for_close(EVENT_TIMEOUT).await {
        api_client.close_thread(&thread_id).await?;
        return Ok(TestResult::fail(scenario, format!("{e}"), start.elapsed()));
    }
    println!("{} First stream ended", "✓".green());

    api_client.post_event(&thread_id, "after-reconnect").await?;
    let result = match second.wait_for_data(EVENT_TIMEOUT).await {
        Ok(event) if event.data == "after-reconnect" => {
            print_event(&second.label, &event);
            TestResult::pass(scenario, start.elapsed())
        }
        Ok(event) => TestResult::fail(
            scenario,
            format!("Expected \"after-reconnect\", got {:?}", event.data),
            start.elapsed(),
        ),
        Err(e) => TestResult::fail(scenario, format!("{e}"), start.elapsed()),
    };

    api_client.close_thread(&thread_id).await?;
    Ok(result)
}

/// Closing a thread ends its open stream.
pub async fn test_close_thread(api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "close_thread";

    println!("\n{}", "=== TEST: Close Thread ===".bright_cyan().bold());

    let thread_id = new_thread_id();
    let mut sse = Connection::establish(&api_client.stream_url(&thread_id), "first".to_string())?;

    api_client.post_event(&thread_id, "ready").await?;
    if let Err(e) = sse.wait_for_data(EVENT_TIMEOUT).await {
        api_client.close_thread(&thread_id).await?;
        return Ok(TestResult::fail(
            scenario,
            format!("Stream never attached: {e}"),
            start.elapsed(),
        ));
    }

    api_client.close_thread(&thread_id).await?;
    println!("{} Closed {}", "→".blue(), thread_id);

    match sse.wait_for_close(EVENT_TIMEOUT).await {
        Ok(_) => {
            println!("{} Stream ended", "✓".green());
            Ok(TestResult::pass(scenario, start.elapsed()))
        }
        Err(e) => Ok(TestResult::fail(scenario, format!("{e}"), start.elapsed())),
    }
}
