// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP server

use std::{
    future::{self, Future},
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use futures_util::{SinkExt as _, StreamExt as _};
use socket2::{Domain, Socket, Type};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tokio_util::codec::Framed;

use crate::{
    codec::tcp::ServerCodec,
    config::Settings,
    error::{ConnectionError, Error},
    frame::tcp::{RequestAdu, ResponseAdu},
    slave::Slave,
    unit::Units,
};

use super::{Service as _, Terminated};

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    lenient: bool,
}

impl Server {
    /// Attach the server to a TCP socket server.
    #[must_use]
    pub fn new(listener: TcpListener) -> Self {
        Self {
            listener,
            lenient: false,
        }
    }

    /// Accept frames with a non-zero protocol id instead of closing the
    /// connection.
    #[must_use]
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Listen on all interfaces at the configured port.
    pub fn bind(settings: &Settings) -> Result<Self, Error> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, settings.server.port));
        let listener = listener(addr).map_err(|source| Error::Bind { addr, source })?;
        Ok(Self::new(listener).lenient(settings.general.debug))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve all units forever.
    pub async fn serve(self, units: Arc<Units>) -> Terminated {
        self.serve_until(units, future::pending()).await
    }

    /// Serve all units until `abort_signal` resolves.
    ///
    /// Every accepted connection is processed in its own task. Pending
    /// connections are dropped when the server is aborted.
    pub async fn serve_until<X>(self, units: Arc<Units>, abort_signal: X) -> Terminated
    where
        X: Future<Output = ()> + Send,
    {
        let Self { listener, lenient } = self;
        let mut connections = JoinSet::new();
        tokio::pin!(abort_signal);
        loop {
            tokio::select! {
                () = &mut abort_signal => {
                    log::info!("Aborting server with {} open connection(s)", connections.len());
                    return Terminated::Aborted;
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            log::error!("Failed to accept connection: {err}");
                            continue;
                        }
                    };
                    log::debug!("Accepted connection from {peer}");
                    let units = Arc::clone(&units);
                    connections.spawn(async move {
                        if let Err(err) = handle_connection(stream, units, lenient).await {
                            log::error!("Closing connection from {peer}: {err}");
                        } else {
                            log::debug!("Connection from {peer} closed");
                        }
                    });
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(err) = joined {
                        log::error!("Connection task failed: {err}");
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    units: Arc<Units>,
    lenient: bool,
) -> Result<(), ConnectionError> {
    stream.set_nodelay(true)?;
    let framed = Framed::new(stream, ServerCodec::new(lenient));
    process(framed, &units).await
}

/// The request-response loop of a single client connection.
///
/// Requests are answered strictly in order. The loop ends when the peer
/// closes the connection, or with an error on malformed frames, transport
/// failures, unknown unit ids and unit faults.
pub(crate) async fn process<T>(
    mut framed: Framed<T, ServerCodec>,
    units: &Units,
) -> Result<(), ConnectionError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(request) = framed.next().await {
        let RequestAdu { hdr, pdu } = request?;
        log::trace!("Received request {hdr:?}: {pdu:?}");
        let Some(unit) = units.get(hdr.unit_id) else {
            if Slave(hdr.unit_id).is_broadcast() {
                log::warn!("Broadcast requests are not served");
            }
            return Err(ConnectionError::UnaddressableUnit(hdr.unit_id));
        };
        let pdu = unit.call(pdu).await?;
        framed.send(ResponseAdu { hdr, pdu }).await?;
    }
    Ok(())
}

/// Start TCP listener - configure and open TCP socket
fn listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    TcpListener::from_std(socket.into())
}
