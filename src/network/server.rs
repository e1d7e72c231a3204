//! TCP Server
//!
//! Accepts connections one at a time and serves each to completion.
//!
//! ## Shutdown
//! `run` polls a non-blocking listener and returns once the shutdown flag is
//! set, so the caller can close the table. The flag is checked between
//! connections; a connected client is served until it disconnects.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;

use super::Connection;

/// Sleep between accept attempts while idle
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// TCP server for one table
///
/// The engine has no internal locking, so connections are served
/// sequentially: a second client waits in the accept backlog until the first
/// disconnects.
pub struct Server {
    listener: TcpListener,
    db: Database,
    read_timeout_ms: u64,
    write_timeout_ms: u64,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: &Config, db: Database) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            db,
            read_timeout_ms: config.read_timeout_ms,
            write_timeout_ms: config.write_timeout_ms,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Flag that stops `run`; safe to set from a signal handler or thread
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Ask `run` to return after the current connection
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Accept and serve a single connection (blocking)
    pub fn accept_one(&mut self) -> Result<()> {
        let (stream, addr) = self.listener.accept()?;
        self.serve(stream, addr)
    }

    /// Serve connections until shutdown is requested
    ///
    /// A failing connection is logged and dropped; the server keeps going.
    pub fn run(&mut self) -> Result<()> {
        self.listener.set_nonblocking(true)?;

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = self.serve(stream, addr) {
                        tracing::warn!("Connection failed: {}", e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        self.listener.set_nonblocking(false)?;
        tracing::info!("Server shutting down");
        Ok(())
    }

    fn serve(&mut self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        tracing::info!("Accepted connection from {}", addr);

        // Some platforms hand out sockets that inherit the listener's mode
        stream.set_nonblocking(false)?;
        let mut connection = Connection::new(stream)?;
        connection.set_timeouts(self.read_timeout_ms, self.write_timeout_ms)?;
        connection.handle(&mut self.db)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Stop serving and hand back the table
    pub fn into_database(self) -> Database {
        self.db
    }
}
