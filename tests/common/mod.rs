// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
    time::timeout,
};

use modbus_slave::{config::SlaveSettings, server::tcp::Server, server::Terminated, Units};

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// A server running on an ephemeral port of the loopback interface.
pub struct TestServer {
    pub addr: SocketAddr,
    pub units: Arc<Units>,
    abort_tx: oneshot::Sender<()>,
    task: JoinHandle<Terminated>,
}

impl TestServer {
    pub async fn start(settings: SlaveSettings) -> anyhow::Result<Self> {
        Self::start_with(settings, false).await
    }

    pub async fn start_with(settings: SlaveSettings, lenient: bool) -> anyhow::Result<Self> {
        let units = Arc::new(Units::new(&settings)?);
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let server = Server::new(listener).lenient(lenient);
        let addr = server.local_addr()?;
        let (abort_tx, abort_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.serve_until(Arc::clone(&units), async move {
            abort_rx.await.ok();
        }));
        Ok(Self {
            addr,
            units,
            abort_tx,
            task,
        })
    }

    pub async fn connect(&self) -> anyhow::Result<TcpStream> {
        Ok(TcpStream::connect(self.addr).await?)
    }

    pub async fn abort(self) -> anyhow::Result<Terminated> {
        self.abort_tx
            .send(())
            .map_err(|()| anyhow::anyhow!("server already stopped"))?;
        Ok(timeout(TIMEOUT, self.task).await??)
    }
}

pub fn slaves(quantity: u8, random_simulation: bool) -> SlaveSettings {
    SlaveSettings {
        quantity,
        random_simulation,
    }
}

/// Build a request frame with protocol id 0.
pub fn request(transaction_id: u16, unit_id: u8, pdu: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(7 + pdu.len());
    frame.extend_from_slice(&transaction_id.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&(pdu.len() as u16 + 1).to_be_bytes());
    frame.push(unit_id);
    frame.extend_from_slice(pdu);
    frame
}

/// Read one complete response frame.
pub async fn read_frame(stream: &mut TcpStream) -> anyhow::Result<Vec<u8>> {
    let mut frame = vec![0; 6];
    timeout(TIMEOUT, stream.read_exact(&mut frame)).await??;
    let len = usize::from(u16::from_be_bytes([frame[4], frame[5]]));
    frame.resize(6 + len, 0);
    timeout(TIMEOUT, stream.read_exact(&mut frame[6..])).await??;
    Ok(frame)
}

/// Send one request frame and read its response frame.
pub async fn exchange(stream: &mut TcpStream, frame: &[u8]) -> anyhow::Result<Vec<u8>> {
    stream.write_all(frame).await?;
    read_frame(stream).await
}

/// Wait until the server closes the connection and return everything sent before.
pub async fn read_until_closed(stream: &mut TcpStream) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    timeout(TIMEOUT, stream.read_to_end(&mut buf)).await??;
    Ok(buf)
}
