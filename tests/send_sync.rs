//! Send/Sync guarantees for shared types.

use cwlogs_appender::test_utils::ScriptedClient;
use cwlogs_appender::{
    CloudWatchAppender, FailureWarner, HttpLogsClient, Shipper, ShipperBuilder, ShipperConfig,
};
use rstest::rstest;
use static_assertions::assert_impl_all;

#[rstest]
fn configuration_is_send_sync() {
    assert_impl_all!(ShipperBuilder: Send, Sync);
    assert_impl_all!(ShipperConfig: Send, Sync);
}

#[rstest]
fn shipper_is_send() {
    assert_impl_all!(Shipper<HttpLogsClient>: Send);
    assert_impl_all!(Shipper<ScriptedClient>: Send);
}

#[rstest]
fn appender_is_send_sync() {
    assert_impl_all!(CloudWatchAppender<HttpLogsClient>: Send, Sync);
    assert_impl_all!(CloudWatchAppender<ScriptedClient>: Send, Sync);
    assert_impl_all!(FailureWarner: Send, Sync);
}
