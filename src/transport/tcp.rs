//! TCP listener and per-connection loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::error::{constants, BlazeError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::session::{Outbound, OutboundReceiver, Session};
use crate::state::ServerState;

type Connection = Framed<TcpStream, PacketCodec>;

/// Shared by every connection task of one server.
struct ConnectionContext {
    state: Arc<ServerState>,
    dispatcher: Arc<Dispatcher>,
    handler_permits: Arc<Semaphore>,
    max_packet_size: usize,
}

/// Bind `config.address` and serve until CTRL+C.
#[instrument(skip_all, fields(address = %config.address))]
pub async fn start_server(
    config: &ServerConfig,
    state: Arc<ServerState>,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    start_server_with_shutdown(config, state, dispatcher, shutdown_rx).await
}

/// Bind `config.address` and serve until `shutdown_rx` fires.
#[instrument(skip_all, fields(address = %config.address))]
pub async fn start_server_with_shutdown(
    config: &ServerConfig,
    state: Arc<ServerState>,
    dispatcher: Arc<Dispatcher>,
    shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(&config.address).await?;
    info!(address = %config.address, "Listening");
    serve(listener, config, state, dispatcher, shutdown_rx).await
}

/// Accept loop over an already bound listener.
///
/// Connections past `max_connections` are closed right after accept. On
/// shutdown the loop stops accepting and waits up to `shutdown_timeout`
/// for open connections to finish.
pub async fn serve(
    listener: TcpListener,
    config: &ServerConfig,
    state: Arc<ServerState>,
    dispatcher: Arc<Dispatcher>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let connection_permits = Arc::new(Semaphore::new(config.max_connections));
    let context = Arc::new(ConnectionContext {
        state: state.clone(),
        dispatcher,
        handler_permits: Arc::new(Semaphore::new(config.handler_workers)),
        max_packet_size: config.max_packet_size,
    });

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Waiting for connections to close...");
                wait_for_connections(&state, config.shutdown_timeout).await;
                state.metrics.log_summary();
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        let Ok(permit) = connection_permits.clone().try_acquire_owned() else {
                            warn!(peer = %peer, "{}", constants::ERR_CONNECTION_LIMIT);
                            state.metrics.connection_rejected();
                            drop(stream);
                            continue;
                        };
                        let context = context.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, peer, context, permit).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

async fn wait_for_connections(state: &ServerState, limit: Duration) {
    let timeout = tokio::time::sleep(limit);
    tokio::pin!(timeout);

    loop {
        let connections = state.metrics.active_connections();
        if connections == 0 {
            info!("All connections closed, shutting down");
            return;
        }
        tokio::select! {
            _ = &mut timeout => {
                warn!(connections, "Shutdown timeout reached, forcing exit");
                return;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                debug!(connections, "Waiting for connections to close");
            }
        }
    }
}

#[instrument(skip_all, fields(peer = %peer))]
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    context: Arc<ConnectionContext>,
    _permit: OwnedSemaphorePermit,
) {
    let state = &context.state;
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "Could not disable Nagle");
    }

    let (session, mut outbound) = state.sessions.create(Some(peer));
    state.metrics.connection_established();
    info!(session_id = session.id(), "New connection established");

    let mut framed = Framed::new(stream, PacketCodec::new(context.max_packet_size));
    let result = run_connection(&mut framed, &context, &session, &mut outbound).await;
    match result {
        Ok(()) | Err(BlazeError::ConnectionClosed) => {}
        Err(BlazeError::Io(e)) => debug!(session_id = session.id(), error = %e, "Socket error"),
        Err(e) => {
            warn!(session_id = session.id(), error = %e, "Dropping connection");
            state.metrics.protocol_error();
        }
    }

    state.on_disconnect(&session);
    state.metrics.connection_closed();
    info!(session_id = session.id(), "Connection closed");
}

async fn run_connection(
    framed: &mut Connection,
    context: &Arc<ConnectionContext>,
    session: &Arc<Session>,
    outbound: &mut OutboundReceiver,
) -> Result<()> {
    loop {
        tokio::select! {
            frame = framed.next() => {
                let packet = match frame {
                    Some(Ok(packet)) => packet,
                    Some(Err(e)) => return Err(e),
                    None => return Ok(()),
                };
                context.state.metrics.packet_received(packet.frame_len() as u64);
                let replies = run_handler(context, session, packet).await;
                // Pushes made while handling were issued before the return
                drain_outbound(framed, context, outbound).await?;
                for reply in replies {
                    send_packet(framed, context, reply).await?;
                }
                SinkExt::<Packet>::flush(framed).await?;
            }

            item = outbound.recv() => {
                let Some(item) = item else {
                    return Err(BlazeError::ConnectionClosed);
                };
                write_outbound(framed, context, item).await?;
                drain_outbound(framed, context, outbound).await?;
                SinkExt::<Packet>::flush(framed).await?;
            }
        }
    }
}

/// Dispatch on the blocking pool, bounded by the handler permits.
async fn run_handler(
    context: &Arc<ConnectionContext>,
    session: &Arc<Session>,
    packet: Packet,
) -> Vec<Packet> {
    let Ok(permit) = context.handler_permits.clone().acquire_owned().await else {
        error!(session_id = session.id(), "{}", constants::ERR_WORKER_POOL_CLOSED);
        return vec![Packet::response_empty(&packet)];
    };

    let task_context = context.clone();
    let task_session = session.clone();
    let request = packet.clone();
    let handled = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        task_context
            .dispatcher
            .dispatch(&task_context.state, &task_session, &request)
    })
    .await;

    match handled {
        Ok(replies) => replies,
        Err(e) => {
            error!(session_id = session.id(), error = %e, ?packet, "{}", constants::ERR_HANDLER_PANIC);
            context.state.metrics.handler_failure();
            vec![Packet::response_empty(&packet)]
        }
    }
}

/// Write everything already queued without waiting for more.
async fn drain_outbound(
    framed: &mut Connection,
    context: &ConnectionContext,
    outbound: &mut OutboundReceiver,
) -> Result<()> {
    while let Ok(item) = outbound.try_recv() {
        write_outbound(framed, context, item).await?;
    }
    Ok(())
}

async fn write_outbound(framed: &mut Connection, context: &ConnectionContext, item: Outbound) -> Result<()> {
    match item {
        Outbound::Packet(packet) => send_packet(framed, context, packet).await,
        Outbound::Batch(packets) => {
            for packet in packets {
                send_packet(framed, context, packet).await?;
            }
            Ok(())
        }
    }
}

async fn send_packet(framed: &mut Connection, context: &ConnectionContext, packet: Packet) -> Result<()> {
    let bytes = packet.frame_len() as u64;
    framed.feed(packet).await?;
    context.state.metrics.packet_sent(bytes);
    Ok(())
}
