#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::time::{Duration, Instant};

use {
    tmibot_chat::{
        CommandRegistry, Dispatcher, Error, Session, SessionSettings, SessionState, StopReason,
    },
    tmibot_config::{ChatConfig, RetryConfig},
    tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream},
    tokio_util::sync::CancellationToken,
};

fn settings(interval: Duration) -> SessionSettings {
    SessionSettings {
        server_addr: "test:6667".into(),
        channel: "testchannel".into(),
        bot_name: "helperbot".into(),
        message_interval: interval,
    }
}

fn open_session(interval: Duration) -> (Session<DuplexStream>, DuplexStream) {
    let (client, server) = tokio::io::duplex(16 * 1024);
    (Session::new(client, settings(interval)).unwrap(), server)
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new("testchannel", CommandRegistry::builtin())
}

async fn read_line(reader: &mut BufReader<DuplexStream>) -> String {
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for a line")
        .unwrap();
    line
}

#[tokio::test]
async fn join_sends_handshake_in_order() {
    let (mut session, server) = open_session(Duration::from_millis(10));
    let mut server = BufReader::new(server);

    session.join_channel("oauth:abc").await.unwrap();

    assert_eq!(read_line(&mut server).await, "PASS oauth:abc\r\n");
    assert_eq!(read_line(&mut server).await, "NICK helperbot\r\n");
    assert_eq!(read_line(&mut server).await, "JOIN #testchannel\r\n");
}

#[tokio::test]
async fn speak_writes_one_privmsg_line() {
    let (mut session, server) = open_session(Duration::from_millis(10));
    let mut server = BufReader::new(server);

    session.speak("hi").await.unwrap();
    session.disconnect().await;

    let mut written = String::new();
    server.read_to_string(&mut written).await.unwrap();
    assert_eq!(written, "PRIVMSG #testchannel hi\r\n");
}

#[tokio::test]
async fn empty_message_is_rejected_without_writing() {
    let (mut session, server) = open_session(Duration::from_millis(10));
    let mut server = BufReader::new(server);

    assert!(matches!(session.speak("").await, Err(Error::EmptyMessage)));
    session.disconnect().await;

    let mut written = String::new();
    server.read_to_string(&mut written).await.unwrap();
    assert!(written.is_empty());
}

#[tokio::test]
async fn speak_flattens_line_breaks() {
    let (mut session, server) = open_session(Duration::from_millis(10));
    let mut server = BufReader::new(server);

    session.speak("hi\r\nJOIN #elsewhere").await.unwrap();
    assert_eq!(
        read_line(&mut server).await,
        "PRIVMSG #testchannel hi  JOIN #elsewhere\r\n"
    );
}

#[tokio::test]
async fn speak_respects_message_interval() {
    let interval = Duration::from_millis(150);
    let (mut session, server) = open_session(interval);
    let mut server = BufReader::new(server);

    let started = Instant::now();
    session.speak("one").await.unwrap();
    session.speak("two").await.unwrap();
    session.speak("three").await.unwrap();
    let elapsed = started.elapsed();

    assert!(
        elapsed >= interval * 2 - Duration::from_millis(20),
        "three messages took only {elapsed:?}"
    );
    assert_eq!(read_line(&mut server).await, "PRIVMSG #testchannel one\r\n");
    assert_eq!(read_line(&mut server).await, "PRIVMSG #testchannel two\r\n");
    assert_eq!(read_line(&mut server).await, "PRIVMSG #testchannel three\r\n");
}

#[tokio::test]
async fn ping_gets_exact_pong() {
    let (mut session, server) = open_session(Duration::from_millis(10));
    let (read, mut write) = tokio::io::split(server);
    let mut read = BufReader::new(read);
    let cancel = CancellationToken::new();

    write.write_all(b"PING :tmi.twitch.tv\r\n").await.unwrap();

    let stop = cancel.clone();
    let observer = tokio::spawn(async move {
        let mut line = String::new();
        read.read_line(&mut line).await.unwrap();
        stop.cancel();
        line
    });

    let reason = session.run(&dispatcher(), &cancel).await.unwrap();
    assert_eq!(reason, StopReason::Cancelled);
    assert_eq!(observer.await.unwrap(), "PONG :tmi.twitch.tv\r\n");
}

#[tokio::test]
async fn owner_shutdown_stops_session() {
    let (mut session, mut server) = open_session(Duration::from_millis(10));
    server
        .write_all(
            b":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #testchannel :hello\r\n\
              :testchannel!testchannel@testchannel.tmi.twitch.tv PRIVMSG #testchannel :!tbdown\r\n",
        )
        .await
        .unwrap();

    let reason = session
        .run(&dispatcher(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reason, StopReason::Shutdown);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn non_owner_shutdown_keeps_reading() {
    let (mut session, mut server) = open_session(Duration::from_millis(10));
    server
        .write_all(b":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #testchannel :!tbdown\r\n")
        .await
        .unwrap();
    // Server hangs up afterwards: the session must still have been reading.
    drop(server);

    let err = session
        .run(&dispatcher(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConnectionClosed));
    assert!(err.is_transient());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn public_command_replies_through_speak() {
    let (mut session, server) = open_session(Duration::from_millis(10));
    let (read, mut write) = tokio::io::split(server);
    let mut read = BufReader::new(read);
    let cancel = CancellationToken::new();

    write
        .write_all(b":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #testchannel :!genprompt\r\n")
        .await
        .unwrap();

    let stop = cancel.clone();
    let observer = tokio::spawn(async move {
        let mut line = String::new();
        read.read_line(&mut line).await.unwrap();
        stop.cancel();
        line
    });

    session.run(&dispatcher(), &cancel).await.unwrap();
    assert_eq!(
        observer.await.unwrap(),
        "PRIVMSG #testchannel I would be generating a prompt right now\r\n"
    );
}

#[tokio::test]
async fn unrecognized_overlong_and_binary_lines_are_skipped() {
    let (mut session, mut server) = open_session(Duration::from_millis(10));
    let long = "x".repeat(10 * 1024);
    server
        .write_all(format!(":tmi.twitch.tv 001 helperbot :Welcome\r\n{long}\r\n").as_bytes())
        .await
        .unwrap();
    server.write_all(b"\xff\xfe garbage\r\n").await.unwrap();
    server
        .write_all(
            b":testchannel!testchannel@testchannel.tmi.twitch.tv PRIVMSG #testchannel :!tbdown\r\n",
        )
        .await
        .unwrap();

    let reason = session
        .run(&dispatcher(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reason, StopReason::Shutdown);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (mut session, _server) = open_session(Duration::from_millis(10));
    session.disconnect().await;
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(session.speak("late").await, Err(Error::NotConnected)));
}

fn chat_config(port: u16) -> ChatConfig {
    ChatConfig {
        server_addr: "127.0.0.1".into(),
        port,
        channel: "testchannel".into(),
        bot_name: "helperbot".into(),
        message_interval_ms: 10,
        connect_retry: RetryConfig {
            initial_backoff_ms: 5,
            max_backoff_ms: 20,
            max_attempts: 3,
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn connect_reaches_listening_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

    let session = Session::connect(&chat_config(port), &CancellationToken::new())
        .await
        .unwrap();
    accept.await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn connect_gives_up_after_max_attempts() {
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = Session::connect(&chat_config(port), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        Error::ConnectExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn connect_retry_honours_cancellation() {
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = chat_config(port);
    config.connect_retry.initial_backoff_ms = 60_000;
    config.connect_retry.max_backoff_ms = 60_000;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = Session::connect(&config, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}
