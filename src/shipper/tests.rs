//! Tests for the shipper state machine.

use rstest::{fixture, rstest};

use crate::client::{ClientError, SequenceToken};
use crate::log_record::EVENT_OVERHEAD_BYTES;
use crate::test_utils::{ManualClock, ScriptedClient};

use super::{
    MAX_BATCH_EVENTS, MAX_EVENT_BYTES, Shipper, ShipperConfig, ShipperError, StartupError,
    Submitted, TOKEN_DISCOVERY_MESSAGE,
};

fn config(flush_interval_ms: u64) -> ShipperConfig {
    ShipperConfig {
        log_group: "group".into(),
        log_stream: "stream".into(),
        flush_interval_ms,
        ..ShipperConfig::default()
    }
}

fn unstarted(clock: &ManualClock, flush_interval_ms: u64) -> Shipper<ScriptedClient> {
    Shipper::with_time_provider(config(flush_interval_ms), clock.provider())
}

fn started(client: &ScriptedClient, clock: &ManualClock) -> Shipper<ScriptedClient> {
    started_with_interval(client, clock, 200)
}

fn started_with_interval(
    client: &ScriptedClient,
    clock: &ManualClock,
    flush_interval_ms: u64,
) -> Shipper<ScriptedClient> {
    let mut shipper = unstarted(clock, flush_interval_ms);
    let handle = client.clone();
    shipper.start_with(move |_| Ok(handle)).expect("start");
    shipper
}

fn service_error() -> ClientError {
    ClientError::Service {
        status: 400,
        code: "ThrottlingException".into(),
        message: "slow down".into(),
    }
}

fn invalid_parameter() -> ClientError {
    ClientError::Service {
        status: 400,
        code: "InvalidParameterException".into(),
        message: "Log event too old".into(),
    }
}

#[fixture]
fn client() -> ScriptedClient {
    ScriptedClient::new()
}

#[fixture]
fn clock() -> ManualClock {
    ManualClock::new(0)
}

#[rstest]
fn start_creates_destination_and_discovers_token(client: ScriptedClient, clock: ManualClock) {
    let shipper = started(&client, &clock);

    assert!(shipper.is_started());
    assert_eq!(client.group_calls(), vec!["group".to_string()]);
    assert_eq!(
        client.stream_calls(),
        vec![("group".to_string(), "stream".to_string())]
    );
    let puts = client.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].messages, vec![TOKEN_DISCOVERY_MESSAGE.to_string()]);
    assert_eq!(
        puts[0].messages[0],
        "Getting the next expected sequenceToken for AwsLogsAppender"
    );
    assert_eq!(puts[0].sequence_token, None);
    assert_eq!(shipper.sequence_token(), Some(&SequenceToken::new("token-1")));
    assert_eq!(shipper.pending(), 0);
    assert_eq!(shipper.last_flush_ms(), 0);
}

#[rstest]
fn start_treats_existing_destination_as_success(client: ScriptedClient, clock: ManualClock) {
    client
        .push_create_group(Err(ClientError::ResourceAlreadyExists("group".into())))
        .push_create_stream(Err(ClientError::ResourceAlreadyExists("stream".into())));

    let shipper = started(&client, &clock);
    assert!(shipper.is_started());
}

#[rstest]
fn start_fails_when_client_cannot_be_built(clock: ManualClock) {
    let mut shipper = unstarted(&clock, 200);
    let err = shipper
        .start_with(|_| Err(ClientError::Construction("no tls".into())))
        .expect_err("construction failure must fail start");
    assert!(matches!(err, StartupError::Client(ClientError::Construction(_))));
    assert!(!shipper.is_started());
}

#[rstest]
fn start_fails_when_group_cannot_be_created(client: ScriptedClient, clock: ManualClock) {
    client.push_create_group(Err(service_error()));
    let mut shipper = unstarted(&clock, 200);
    let handle = client.clone();

    let err = shipper
        .start_with(move |_| Ok(handle))
        .expect_err("group failure must fail start");

    assert!(matches!(
        err,
        StartupError::CreateLogGroup { ref log_group, .. } if log_group == "group"
    ));
    assert!(!shipper.is_started());
    assert!(client.stream_calls().is_empty());
    assert_eq!(client.put_count(), 0);
}

#[rstest]
fn start_fails_when_stream_cannot_be_created(client: ScriptedClient, clock: ManualClock) {
    client.push_create_stream(Err(ClientError::Transport("reset".into())));
    let mut shipper = unstarted(&clock, 200);
    let handle = client.clone();

    let err = shipper
        .start_with(move |_| Ok(handle))
        .expect_err("stream failure must fail start");

    assert!(matches!(err, StartupError::CreateLogStream { .. }));
    assert!(!shipper.is_started());
    assert_eq!(client.put_count(), 0);
}

#[rstest]
fn discovery_rejection_supplies_starting_token(client: ScriptedClient, clock: ManualClock) {
    client.push_put(Err(ClientError::InvalidSequenceToken {
        expected: Some(SequenceToken::new("X")),
        message: "The next expected sequenceToken is: X".into(),
    }));

    let mut shipper = started(&client, &clock);
    assert_eq!(shipper.sequence_token(), Some(&SequenceToken::new("X")));

    clock.set(1_000);
    assert!(matches!(shipper.submit("first"), Ok(Submitted::Flushed(1))));
    let puts = client.puts();
    assert_eq!(puts[1].sequence_token, Some(SequenceToken::new("X")));
}

#[rstest]
fn discovery_transport_failure_fails_start(client: ScriptedClient, clock: ManualClock) {
    client.push_put(Err(ClientError::Transport("timed out".into())));
    let mut shipper = unstarted(&clock, 200);
    let handle = client.clone();

    let err = shipper
        .start_with(move |_| Ok(handle))
        .expect_err("discovery failure must fail start");
    assert!(matches!(err, StartupError::TokenDiscovery(ClientError::Transport(_))));
    assert!(!shipper.is_started());
}

#[rstest]
fn second_start_is_a_no_op(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    shipper
        .start_with(|_| Err(ClientError::Construction("must not be called".into())))
        .expect("second start succeeds");
    assert_eq!(client.group_calls().len(), 1);
    assert_eq!(client.put_count(), 1);
}

#[rstest]
fn submit_before_start_queues_nothing(clock: ManualClock) {
    let mut shipper = unstarted(&clock, 200);
    let err = shipper.submit("early").expect_err("not started");
    assert!(matches!(err, ShipperError::NotStarted));
    assert_eq!(shipper.pending(), 0);
}

#[rstest]
fn interval_debounces_flushes(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);

    clock.set(0);
    assert!(matches!(shipper.submit("A"), Ok(Submitted::Buffered)));
    clock.set(50);
    assert!(matches!(shipper.submit("B"), Ok(Submitted::Buffered)));
    assert_eq!(shipper.pending(), 2);

    clock.set(250);
    assert!(matches!(shipper.submit("C"), Ok(Submitted::Flushed(3))));
    assert_eq!(shipper.pending(), 0);
    assert_eq!(shipper.last_flush_ms(), 250);

    let puts = client.puts();
    assert_eq!(puts.len(), 2);
    assert_eq!(puts[1].messages, vec!["A", "B", "C"]);
    assert_eq!(puts[1].timestamps, vec![0, 50, 250]);
}

#[rstest]
fn wall_clock_first_submission_flushes_immediately(client: ScriptedClient) {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut shipper = started(&client, &clock);
    assert!(matches!(shipper.submit("now"), Ok(Submitted::Flushed(1))));
}

#[rstest]
fn flushing_an_empty_batch_makes_no_call(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    let calls = client.put_count();

    clock.set(5_000);
    assert!(matches!(shipper.flush(), Ok(0)));
    assert_eq!(client.put_count(), calls);
    assert_eq!(shipper.last_flush_ms(), 0);
}

#[rstest]
fn flush_before_start_is_rejected(clock: ManualClock) {
    let mut shipper = unstarted(&clock, 200);
    assert!(matches!(shipper.flush(), Err(ShipperError::NotStarted)));
}

#[rstest]
fn failed_put_keeps_batch_and_clock(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    clock.set(100);
    shipper.submit("kept-1").expect("buffered");
    client.push_put(Err(service_error()));

    clock.set(300);
    let err = shipper.submit("kept-2").expect_err("put fails");
    assert!(matches!(err, ShipperError::Transport { pending: 2, .. }));
    let pending: Vec<_> = shipper
        .pending_events()
        .iter()
        .map(|event| event.message().to_owned())
        .collect();
    assert_eq!(pending, vec!["kept-1", "kept-2"]);
    assert_eq!(shipper.last_flush_ms(), 0);
    assert_eq!(shipper.sequence_token(), Some(&SequenceToken::new("token-1")));

    clock.set(400);
    assert!(matches!(shipper.flush(), Ok(2)));
    let puts = client.puts();
    assert_eq!(puts[1].messages, puts[2].messages);
    assert_eq!(puts[2].sequence_token, Some(SequenceToken::new("token-1")));
    assert_eq!(shipper.last_flush_ms(), 400);
}

#[rstest]
fn each_flush_uses_the_previous_response_token(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    for step in 1..=4 {
        clock.set(step * 1_000);
        shipper.submit(format!("msg-{step}")).expect("flushes");
    }

    let puts = client.puts();
    assert_eq!(puts.len(), 5);
    for (index, put) in puts.iter().enumerate().skip(1) {
        assert_eq!(
            put.sequence_token,
            Some(SequenceToken::new(format!("token-{index}")))
        );
    }
    assert_eq!(shipper.sequence_token(), Some(&SequenceToken::new("token-5")));
}

#[rstest]
fn steady_state_token_rejection_adopts_expected_token(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    client.push_put(Err(ClientError::InvalidSequenceToken {
        expected: Some(SequenceToken::new("Y")),
        message: "stale".into(),
    }));

    clock.set(1_000);
    let err = shipper.submit("retry-me").expect_err("token rejected");
    assert!(matches!(err, ShipperError::SequenceTokenRejected { pending: 1, .. }));
    assert_eq!(shipper.sequence_token(), Some(&SequenceToken::new("Y")));
    assert_eq!(shipper.last_flush_ms(), 0);

    assert!(matches!(shipper.flush(), Ok(1)));
    assert_eq!(client.puts()[2].sequence_token, Some(SequenceToken::new("Y")));
}

#[rstest]
fn already_accepted_data_counts_as_shipped(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    client.push_put(Err(ClientError::DataAlreadyAccepted {
        expected: Some(SequenceToken::new("Z")),
        message: "duplicate".into(),
    }));

    clock.set(1_000);
    assert!(matches!(shipper.submit("dup"), Ok(Submitted::Flushed(1))));
    assert_eq!(shipper.pending(), 0);
    assert_eq!(shipper.sequence_token(), Some(&SequenceToken::new("Z")));
}

#[rstest]
fn oversized_batches_are_split_in_order(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started_with_interval(&client, &clock, u64::MAX / 2);
    let total = MAX_BATCH_EVENTS + 3;
    for i in 0..total {
        shipper.submit(format!("e{i}")).expect("buffered");
    }

    assert!(matches!(shipper.flush(), Ok(n) if n == total));
    let puts = client.puts();
    assert_eq!(puts.len(), 3);
    assert_eq!(puts[1].messages.len(), MAX_BATCH_EVENTS);
    assert_eq!(puts[2].messages, vec!["e10000", "e10001", "e10002"]);
    assert_eq!(puts[2].sequence_token, Some(SequenceToken::new("token-2")));
}

#[rstest]
fn accepted_chunks_are_not_resent_after_a_later_failure(
    client: ScriptedClient,
    clock: ManualClock,
) {
    let mut shipper = started_with_interval(&client, &clock, u64::MAX / 2);
    let total = MAX_BATCH_EVENTS + 3;
    for i in 0..total {
        shipper.submit(format!("e{i}")).expect("buffered");
    }
    client
        .push_put(Ok(Some(SequenceToken::new("after-first"))))
        .push_put(Err(ClientError::Transport("reset".into())));

    let err = shipper.flush().expect_err("second chunk fails");
    assert_eq!(err.pending(), 3);
    assert_eq!(shipper.pending_events()[0].message(), "e10000");
    assert_eq!(
        shipper.sequence_token(),
        Some(&SequenceToken::new("after-first"))
    );
    assert_eq!(shipper.last_flush_ms(), 0);
}

#[rstest]
fn stop_drains_the_batch(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    shipper.submit("tail-1").expect("buffered");
    shipper.submit("tail-2").expect("buffered");

    shipper.stop().expect("stop drains");

    assert!(!shipper.is_started());
    assert_eq!(shipper.pending(), 0);
    assert_eq!(client.shipped_messages(), vec!["tail-1", "tail-2"]);
    assert!(matches!(shipper.submit("late"), Err(ShipperError::NotStarted)));
}

#[rstest]
fn stop_without_start_is_safe(clock: ManualClock) {
    let mut shipper = unstarted(&clock, 200);
    shipper.stop().expect("nothing to stop");
    shipper.stop().expect("still nothing to stop");
}

#[rstest]
fn failed_final_flush_keeps_shipper_running(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    shipper.submit("last").expect("buffered");
    client.push_put(Err(service_error()));

    let err = shipper.stop().expect_err("final flush fails");
    assert_eq!(err.pending(), 1);
    assert!(shipper.is_started());

    shipper.stop().expect("retry succeeds");
    assert!(!shipper.is_started());
    assert_eq!(client.shipped_messages(), vec!["last", "last"]);
}

#[rstest]
fn dropping_a_started_shipper_drains_it(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    shipper.submit("on-drop").expect("buffered");
    drop(shipper);
    assert_eq!(client.shipped_messages(), vec!["on-drop"]);
}

#[rstest]
fn zero_interval_flushes_whenever_the_clock_moves(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started_with_interval(&client, &clock, 0);
    for step in 1..=3 {
        clock.set(step);
        assert!(matches!(shipper.submit(format!("m{step}")), Ok(Submitted::Flushed(1))));
    }
    assert!(matches!(shipper.submit("same-instant"), Ok(Submitted::Buffered)));
    assert_eq!(client.shipped_messages(), vec!["m1", "m2", "m3"]);
}

#[rstest]
fn refused_events_do_not_block_later_ones(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    for step in 1..=50 {
        client.push_put(Err(invalid_parameter()));
        clock.set(step * 1_000);
        let err = shipper.submit(format!("bad-{step}")).expect_err("refused");
        assert!(matches!(
            err,
            ShipperError::Rejected {
                dropped: 1,
                pending: 0,
                ..
            }
        ));
    }
    assert_eq!(shipper.pending(), 0);
    assert_eq!(shipper.last_flush_ms(), 0);

    clock.set(60_000);
    assert!(matches!(shipper.submit("good"), Ok(Submitted::Flushed(1))));
    let puts = client.puts();
    assert_eq!(puts.len(), 52);
    assert_eq!(puts[51].messages, vec!["good"]);
}

#[rstest]
fn refused_chunk_is_dropped_and_the_rest_stays_queued(
    client: ScriptedClient,
    clock: ManualClock,
) {
    let mut shipper = started_with_interval(&client, &clock, u64::MAX / 2);
    let total = MAX_BATCH_EVENTS + 3;
    for i in 0..total {
        shipper.submit(format!("e{i}")).expect("buffered");
    }
    client.push_put(Err(invalid_parameter()));

    let err = shipper.flush().expect_err("first chunk refused");
    assert!(matches!(
        err,
        ShipperError::Rejected {
            dropped: MAX_BATCH_EVENTS,
            pending: 3,
            ..
        }
    ));
    assert_eq!(shipper.pending_events()[0].message(), "e10000");
    assert_eq!(shipper.last_flush_ms(), 0);

    assert!(matches!(shipper.flush(), Ok(3)));
    assert_eq!(client.shipped_messages().len(), MAX_BATCH_EVENTS + 3);
}

#[rstest]
fn oversized_event_is_refused_at_submit(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    shipper.submit("queued").expect("buffered");

    let err = shipper
        .submit("x".repeat(MAX_EVENT_BYTES))
        .expect_err("over the event limit");
    assert!(matches!(
        err,
        ShipperError::EventTooLarge {
            limit: MAX_EVENT_BYTES,
            pending: 1,
            ..
        }
    ));
    assert_eq!(shipper.pending(), 1);

    let largest = "x".repeat(MAX_EVENT_BYTES - EVENT_OVERHEAD_BYTES);
    assert!(matches!(shipper.submit(largest), Ok(Submitted::Buffered)));
    assert_eq!(shipper.pending(), 2);
}

#[rstest]
fn submit_at_stamps_the_given_time(client: ScriptedClient, clock: ManualClock) {
    let mut shipper = started(&client, &clock);
    clock.set(120);
    assert_eq!(shipper.now_ms(), 120);

    shipper.submit_at("stamped", 42).expect("buffered");
    assert_eq!(shipper.pending_events()[0].timestamp(), 42);
}
