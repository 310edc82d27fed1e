//! End-to-end tests over a real TCP listener.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use blaze_protocol::config::ServerConfig;
use blaze_protocol::core::codec::PacketCodec;
use blaze_protocol::core::label::Label;
use blaze_protocol::core::packet::{Packet, PacketType};
use blaze_protocol::core::tdf::{FieldLookup, Tdf, TdfGroup, TdfList};
use blaze_protocol::protocol::components::{
    authentication, game_manager, user_sessions, util, BlazeErrorCode,
};
use blaze_protocol::protocol::Dispatcher;
use blaze_protocol::state::ServerState;
use blaze_protocol::store::MemoryStore;
use blaze_protocol::transport::tcp;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;

type Client = Framed<TcpStream, PacketCodec>;

const MAIL: Label = Label::from_static("MAIL");
const PASS: Label = Label::from_static("PASS");
const PCTK: Label = Label::from_static("PCTK");
const GID: Label = Label::from_static("GID");
const ATTR: Label = Label::from_static("ATTR");

struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    store: Arc<MemoryStore>,
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<blaze_protocol::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(ServerState::new(store.clone()));
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let config = ServerConfig {
            address: addr.to_string(),
            shutdown_timeout: Duration::from_secs(2),
            ..ServerConfig::default()
        };

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            tcp::serve(
                listener,
                &config,
                server_state,
                Arc::new(Dispatcher::with_default_routes()),
                shutdown_rx,
            )
            .await
        });

        Self {
            addr,
            state,
            store,
            shutdown,
            handle,
        }
    }

    async fn client(&self) -> Client {
        Framed::new(TcpStream::connect(self.addr).await.unwrap(), PacketCodec::default())
    }

    async fn stop(self) {
        self.shutdown.send(()).await.unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

async fn next_packet(client: &mut Client) -> Packet {
    timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for a packet")
        .expect("connection closed")
        .expect("decode failed")
}

/// Read until a packet with `command` on `component` arrives.
async fn wait_for(client: &mut Client, component: u16, command: u16) -> Packet {
    loop {
        let packet = next_packet(client).await;
        if packet.header.component == component && packet.header.command == command {
            return packet;
        }
    }
}

async fn request(client: &mut Client, packet: Packet) -> Packet {
    let id = packet.header.id;
    client.send(packet).await.unwrap();
    loop {
        let reply = next_packet(client).await;
        if reply.header.id == id && reply.header.ty != PacketType::Unique {
            return reply;
        }
    }
}

async fn login(client: &mut Client, email: &str, id: u16) -> Packet {
    request(
        client,
        Packet::request(
            authentication::COMPONENT,
            authentication::LOGIN,
            id,
            vec![Tdf::string(MAIL, email), Tdf::string(PASS, "secret")],
        ),
    )
    .await
}

#[tokio::test]
async fn test_login_then_identity_notifications() {
    let server = TestServer::start().await;
    let account = server.store.add_account("shepard@normandy.sr2", "secret", "Shepard");
    let mut client = server.client().await;

    let pre_auth = request(
        &mut client,
        Packet::request(util::COMPONENT, util::PRE_AUTH, 1, vec![]),
    )
    .await;
    assert_eq!(pre_auth.header.ty, PacketType::Response);

    let reply = login(&mut client, "shepard@normandy.sr2", 2).await;
    assert_eq!(reply.header.ty, PacketType::Response);
    assert_eq!(
        reply.records().unwrap().str_field(PCTK),
        Some(account.session_token.as_str())
    );

    // Returned by the handler after the login response
    let added = next_packet(&mut client).await;
    assert_eq!(
        (added.header.component, added.header.command),
        (user_sessions::COMPONENT, user_sessions::NOTIFY_USER_ADDED)
    );
    let updated = next_packet(&mut client).await;
    assert_eq!(updated.header.command, user_sessions::NOTIFY_USER_UPDATED);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_unknown_and_unauthenticated_keep_connection_open() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let unknown = request(&mut client, Packet::request(0x9999, 0x1, 10, vec![])).await;
    assert_eq!(unknown.header.ty, PacketType::Response);
    assert!(unknown.contents().is_empty());

    let refused = request(
        &mut client,
        Packet::request(game_manager::COMPONENT, game_manager::CREATE_GAME, 11, vec![]),
    )
    .await;
    assert_eq!(refused.header.ty, PacketType::Error);
    assert_eq!(refused.header.error, BlazeErrorCode::InvalidAccount.as_u16());

    let pong = request(&mut client, Packet::request(util::COMPONENT, util::PING, 12, vec![])).await;
    assert_eq!(pong.header.ty, PacketType::Response);
    assert!(!pong.contents().is_empty());

    let metrics = server.state.metrics.snapshot();
    assert_eq!(metrics.unknown_commands, 1);
    assert_eq!(metrics.auth_rejections, 1);
    assert_eq!(metrics.packets_received, 3);

    drop(client);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_matchmaking_notifies_host_across_connections() {
    let server = TestServer::start().await;
    server.store.add_account("host@normandy.sr2", "secret", "Host");
    server.store.add_account("seeker@normandy.sr2", "secret", "Seeker");

    let mut host = server.client().await;
    login(&mut host, "host@normandy.sr2", 1).await;
    let created = request(
        &mut host,
        Packet::request(
            game_manager::COMPONENT,
            game_manager::CREATE_GAME,
            2,
            vec![Tdf::string_map(
                ATTR,
                &[("ME3map".to_string(), "map11".to_string())].into(),
            )],
        ),
    )
    .await;
    let game_id = created.records().unwrap().varint_field(GID).unwrap();

    let mut seeker = server.client().await;
    login(&mut seeker, "seeker@normandy.sr2", 1).await;
    let rule = TdfGroup::new(vec![
        Tdf::string(Label::from_static("NAME"), "ME3_gameMapMatchRule"),
        Tdf::list(Label::from_static("VALU"), TdfList::String(vec!["map11".into()])),
    ]);
    seeker
        .send(Packet::request(
            game_manager::COMPONENT,
            game_manager::START_MATCHMAKING,
            2,
            vec![Tdf::group(
                Label::from_static("CRIT"),
                vec![Tdf::list(Label::from_static("RLST"), TdfList::Group(vec![rule]))],
            )],
        ))
        .await
        .unwrap();

    // The join pushes the setup during the handler, ahead of the response
    let setup = wait_for(&mut seeker, game_manager::COMPONENT, game_manager::NOTIFY_GAME_SETUP).await;
    assert_eq!(setup.header.ty, PacketType::Unique);
    let started = wait_for(&mut seeker, game_manager::COMPONENT, game_manager::START_MATCHMAKING).await;
    assert_eq!(started.header.ty, PacketType::Response);

    // Pushed from the seeker's handler, written by the host's connection
    let joining = wait_for(&mut host, game_manager::COMPONENT, game_manager::NOTIFY_PLAYER_JOINING).await;
    assert_eq!(joining.records().unwrap().varint_field(GID), Some(game_id));

    // Host disconnect removes it from the game and the seeker hears about it
    drop(host);
    let removed = wait_for(&mut seeker, game_manager::COMPONENT, game_manager::NOTIFY_PLAYER_REMOVED).await;
    assert_eq!(removed.records().unwrap().varint_field(GID), Some(game_id));

    drop(seeker);
    server.stop().await;
}

#[tokio::test]
async fn test_own_pushes_precede_the_response() {
    let server = TestServer::start().await;
    server.store.add_account("joker@normandy.sr2", "secret", "Joker");
    let mut client = server.client().await;
    login(&mut client, "joker@normandy.sr2", 1).await;

    let started = request(
        &mut client,
        Packet::request(game_manager::COMPONENT, game_manager::START_MATCHMAKING, 2, vec![]),
    )
    .await;
    assert_eq!(started.header.ty, PacketType::Response);
    assert!(server.state.games.is_empty());

    client
        .send(Packet::request(
            game_manager::COMPONENT,
            game_manager::CANCEL_MATCHMAKING,
            3,
            vec![],
        ))
        .await
        .unwrap();
    let first = next_packet(&mut client).await;
    let second = next_packet(&mut client).await;
    assert_eq!(
        [
            (first.header.command, first.header.ty),
            (second.header.command, second.header.ty),
        ],
        [
            (game_manager::NOTIFY_MATCHMAKING_FAILED, PacketType::Unique),
            (game_manager::CANCEL_MATCHMAKING, PacketType::Response),
        ]
    );
    assert_eq!(second.header.id, 3);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_waits_for_clients() {
    let server = TestServer::start().await;
    let mut client = server.client().await;
    request(&mut client, Packet::request(util::COMPONENT, util::PING, 1, vec![])).await;
    assert_eq!(server.state.metrics.active_connections(), 1);

    let state = server.state.clone();
    drop(client);
    server.stop().await;
    assert_eq!(state.metrics.active_connections(), 0);
    assert!(state.sessions.is_empty());
}
