//! End-to-end queries against a scripted server on localhost.
use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use bzip2::write::BzEncoder;
use bzip2::Compression;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use sourcequery::info::ServerType;
use sourcequery::{Client, ClientOptions, EngineGeneration, ErrorKind, SourceQueryError};

const SINGLE: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
const SPLIT: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];
const TOKEN: [u8; 4] = [0x4B, 0x01, 0xA0, 0x3F];

/// One request the server expects, and the datagrams it answers with.
struct Exchange {
    expect: Vec<u8>,
    replies: Vec<Vec<u8>>,
}

fn exchange(expect: Vec<u8>, replies: Vec<Vec<u8>>) -> Exchange {
    Exchange { expect, replies }
}

/// Run a server that plays `script` once, asserting every request it gets.
async fn serve(script: Vec<Exchange>) -> (SocketAddr, JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        for step in script {
            let (size, peer) = socket.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..size], step.expect.as_slice());
            for reply in step.replies {
                socket.send_to(&reply, peer).await.unwrap();
            }
        }
    });

    (addr, handle)
}

fn options() -> ClientOptions {
    ClientOptions {
        timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

fn info_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut request = SINGLE.to_vec();
    request.push(0x54);
    request.extend_from_slice(b"Source Engine Query\0");
    if let Some(challenge) = challenge {
        request.extend_from_slice(&challenge);
    }
    request
}

fn request(kind: u8, challenge: [u8; 4]) -> Vec<u8> {
    let mut request = SINGLE.to_vec();
    request.push(kind);
    request.extend_from_slice(&challenge);
    request
}

fn challenge_reply() -> Vec<u8> {
    let mut reply = SINGLE.to_vec();
    reply.push(0x41);
    reply.extend_from_slice(&TOKEN);
    reply
}

fn info_reply() -> Vec<u8> {
    let mut reply = SINGLE.to_vec();
    reply.push(0x49);
    reply.push(17);
    for field in ["Uncletopia | New York City 4", "pl_badwater", "tf", "Team Fortress"] {
        reply.extend_from_slice(field.as_bytes());
        reply.push(0);
    }
    reply.extend_from_slice(&440u16.to_le_bytes());
    reply.extend_from_slice(&[23, 24, 0, b'd', b'l', 0, 1]);
    reply.extend_from_slice(b"8622567\0");
    reply
}

fn rules_reply(rules: &[(&str, &str)]) -> Vec<u8> {
    let mut reply = SINGLE.to_vec();
    reply.push(0x45);
    reply.extend_from_slice(&(rules.len() as u16).to_le_bytes());
    for (name, value) in rules {
        reply.extend_from_slice(name.as_bytes());
        reply.push(0);
        reply.extend_from_slice(value.as_bytes());
        reply.push(0);
    }
    reply
}

fn players_reply(players: &[(&str, i32, f32)]) -> Vec<u8> {
    let mut reply = SINGLE.to_vec();
    reply.push(0x44);
    reply.push(players.len() as u8);
    for (name, score, duration) in players {
        reply.push(0);
        reply.extend_from_slice(name.as_bytes());
        reply.push(0);
        reply.extend_from_slice(&score.to_le_bytes());
        reply.extend_from_slice(&duration.to_le_bytes());
    }
    reply
}

/// Split `payload` into Source-layout fragments.
fn source_fragments(id: u32, payload: &[u8], chunk: usize) -> Vec<Vec<u8>> {
    let chunks: Vec<&[u8]> = payload.chunks(chunk).collect();
    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let mut datagram = SPLIT.to_vec();
            datagram.extend_from_slice(&id.to_le_bytes());
            datagram.extend_from_slice(&[chunks.len() as u8, index as u8]);
            datagram.extend_from_slice(&1248u16.to_le_bytes());
            datagram.extend_from_slice(chunk);
            datagram
        })
        .collect()
}

fn goldsource_fragments(id: u32, payload: &[u8], chunk: usize) -> Vec<Vec<u8>> {
    let chunks: Vec<&[u8]> = payload.chunks(chunk).collect();
    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let mut datagram = SPLIT.to_vec();
            datagram.extend_from_slice(&id.to_le_bytes());
            datagram.push(((index as u8) << 4) | chunks.len() as u8);
            datagram.extend_from_slice(chunk);
            datagram
        })
        .collect()
}

fn many_rules() -> Vec<(String, String)> {
    (0..60)
        .map(|i| (format!("sm_rule_{i}"), format!("value number {i}")))
        .collect()
}

fn as_refs(rules: &[(String, String)]) -> Vec<(&str, &str)> {
    rules
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

#[tokio::test]
async fn info_without_challenge() {
    let (addr, server) = serve(vec![exchange(info_request(None), vec![info_reply()])]).await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let info = client.info().await.unwrap();
    client.close();
    server.await.unwrap();

    assert_eq!(info.name, "Uncletopia | New York City 4");
    assert_eq!(info.map, "pl_badwater");
    assert_eq!(info.id, 440);
    assert_eq!(info.players, 23);
    assert_eq!(info.server_type, ServerType::Dedicated);
    assert_eq!(info.version.as_deref(), Some("8622567"));
    assert_eq!(info.extra, None);
}

#[tokio::test]
async fn info_answers_challenge() {
    let (addr, server) = serve(vec![
        exchange(info_request(None), vec![challenge_reply()]),
        exchange(info_request(Some(TOKEN)), vec![info_reply()]),
    ])
    .await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let info = client.info().await.unwrap();
    server.await.unwrap();

    assert_eq!(info.folder, "tf");
}

#[tokio::test]
async fn players_with_challenge() {
    let (addr, server) = serve(vec![
        exchange(request(0x55, [0xFF; 4]), vec![challenge_reply()]),
        exchange(
            request(0x55, TOKEN),
            vec![players_reply(&[("Alice", 10, 120.5), ("Bob", 3, 45.0)])],
        ),
    ])
    .await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let players = client.players().await.unwrap();
    server.await.unwrap();

    assert_eq!(players.count, 2);
    let names: Vec<&str> = players.players.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Alice", "Bob"]);
    assert_eq!(players.players[0].duration, 120.5);
    assert_eq!(players.players[1].score, 3);
}

#[tokio::test]
async fn players_without_challenge() {
    let (addr, server) = serve(vec![exchange(
        request(0x55, [0xFF; 4]),
        vec![players_reply(&[("Carol", 7, 12.25)])],
    )])
    .await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let players = client.players().await.unwrap();
    server.await.unwrap();

    assert_eq!(players.count, 1);
    assert_eq!(players.players[0].name, "Carol");
    assert_eq!(players.players[0].score, 7);
    assert_eq!(players.players[0].duration, 12.25);
    assert_eq!(players.players[0].ship, None);
}

#[tokio::test]
async fn rules_without_challenge() {
    let (addr, server) = serve(vec![exchange(
        request(0x56, [0xFF; 4]),
        vec![rules_reply(&[("mp_timelimit", "30")])],
    )])
    .await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let rules = client.rules().await.unwrap();
    server.await.unwrap();

    assert_eq!(rules.rules["mp_timelimit"], "30");
}

#[tokio::test]
async fn split_rules_out_of_order() {
    let rules = many_rules();
    let payload = rules_reply(&as_refs(&rules));
    let mut fragments = source_fragments(7, &payload, 400);
    assert!(fragments.len() >= 3);
    fragments.reverse();

    let (addr, server) = serve(vec![
        exchange(request(0x56, [0xFF; 4]), vec![challenge_reply()]),
        exchange(request(0x56, TOKEN), fragments),
    ])
    .await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let decoded = client.rules().await.unwrap();
    server.await.unwrap();

    assert_eq!(decoded.count as usize, rules.len());
    for (name, value) in &rules {
        assert_eq!(&decoded.rules[name], value);
    }
}

#[tokio::test]
async fn split_answer_instead_of_challenge() {
    let rules = many_rules();
    let payload = rules_reply(&as_refs(&rules));

    let (addr, server) = serve(vec![exchange(
        request(0x56, [0xFF; 4]),
        source_fragments(11, &payload, 500),
    )])
    .await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let decoded = client.rules().await.unwrap();
    server.await.unwrap();

    assert_eq!(decoded.rules.len(), rules.len());
}

#[tokio::test]
async fn compressed_split_rules() {
    let rules = many_rules();
    let payload = rules_reply(&as_refs(&rules));

    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&payload).unwrap();
    let mut compressed = (payload.len() as u32).to_le_bytes().to_vec();
    compressed.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    compressed.extend_from_slice(&encoder.finish().unwrap());

    let (addr, server) = serve(vec![
        exchange(request(0x56, [0xFF; 4]), vec![challenge_reply()]),
        exchange(
            request(0x56, TOKEN),
            source_fragments(0x8000_0002, &compressed, 100),
        ),
    ])
    .await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let decoded = client.rules().await.unwrap();
    server.await.unwrap();

    assert_eq!(decoded.rules.len(), rules.len());
}

#[tokio::test]
async fn corrupt_compressed_answer_fails() {
    let payload = rules_reply(&[("sv_cheats", "0")]);

    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&payload).unwrap();
    let mut compressed = (payload.len() as u32).to_le_bytes().to_vec();
    compressed.extend_from_slice(&(crc32fast::hash(&payload) ^ 0xFFFF).to_le_bytes());
    compressed.extend_from_slice(&encoder.finish().unwrap());

    let (addr, server) = serve(vec![exchange(
        request(0x56, [0xFF; 4]),
        source_fragments(0x8000_0003, &compressed, 30),
    )])
    .await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let err = client.rules().await.unwrap_err();
    server.await.unwrap();

    assert!(matches!(err, SourceQueryError::ChecksumMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::ProtocolMismatch);
}

#[tokio::test]
async fn goldsource_split_players() {
    let players: Vec<(String, i32, f32)> = (0..40)
        .map(|i| (format!("player with a long name {i}"), i, i as f32))
        .collect();
    let refs: Vec<(&str, i32, f32)> = players.iter().map(|(n, s, d)| (n.as_str(), *s, *d)).collect();
    let payload = players_reply(&refs);

    let (addr, server) = serve(vec![
        exchange(request(0x55, [0xFF; 4]), vec![challenge_reply()]),
        exchange(request(0x55, TOKEN), goldsource_fragments(5, &payload, 600)),
    ])
    .await;

    let options = ClientOptions {
        engine_generation: EngineGeneration::GoldSource,
        ..options()
    };
    let mut client = Client::new(&addr.to_string(), options).await.unwrap();
    assert_eq!(client.options().engine_generation, EngineGeneration::GoldSource);
    let decoded = client.players().await.unwrap();
    server.await.unwrap();

    assert_eq!(decoded.players.len(), 40);
    assert_eq!(decoded.players[39].name, "player with a long name 39");
    assert_eq!(decoded.players[39].score, 39);
}

#[tokio::test]
async fn duplicate_fragment_fails() {
    let payload = rules_reply(&as_refs(&many_rules()));
    let fragments = source_fragments(9, &payload, 500);
    let duplicated = vec![fragments[0].clone(), fragments[0].clone()];

    let (addr, server) = serve(vec![exchange(request(0x56, [0xFF; 4]), duplicated)]).await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    let err = client.rules().await.unwrap_err();
    server.await.unwrap();

    assert!(matches!(err, SourceQueryError::DuplicateFragment(0)));
}

#[tokio::test]
async fn ping_alive() {
    let mut reply = SINGLE.to_vec();
    reply.push(0x6A);
    let (addr, server) = serve(vec![exchange(vec![0xFF, 0xFF, 0xFF, 0xFF, 0x69], vec![reply])]).await;

    let mut client = Client::new(&addr.to_string(), options()).await.unwrap();
    assert!(client.ping().await.unwrap());
    server.await.unwrap();
}

#[tokio::test]
async fn silent_server_times_out() {
    let (addr, server) = serve(vec![exchange(vec![0xFF, 0xFF, 0xFF, 0xFF, 0x69], vec![])]).await;

    let options = ClientOptions {
        timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let mut client = Client::new(&addr.to_string(), options).await.unwrap();
    let err = client.ping().await.unwrap_err();
    server.await.unwrap();

    assert!(matches!(err, SourceQueryError::Timeout(_)));
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn queries_are_spaced_out() {
    let mut reply = SINGLE.to_vec();
    reply.push(0x6A);
    let ping = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x69];
    let (addr, server) = serve(vec![
        exchange(ping.clone(), vec![reply.clone()]),
        exchange(ping, vec![reply]),
    ])
    .await;

    let options = ClientOptions {
        min_query_interval: Some(Duration::from_millis(200)),
        ..options()
    };
    let mut client = Client::new(&addr.to_string(), options).await.unwrap();
    client.ping().await.unwrap();
    let start = Instant::now();
    client.ping().await.unwrap();
    server.await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn invalid_options_fail_before_connecting() {
    let zero_timeout = ClientOptions {
        timeout: Duration::ZERO,
        ..Default::default()
    };
    let err = Client::new("127.0.0.1:27015", zero_timeout).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = Client::new("", ClientOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn default_port_is_appended() {
    let client = Client::new("127.0.0.1", options()).await.unwrap();

    assert_eq!(client.address(), "127.0.0.1:27015");
}
