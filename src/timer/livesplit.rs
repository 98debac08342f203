//! LiveSplit Server client.
//!
//! Speaks the LiveSplit Server text protocol over TCP: one command per line,
//! terminated by CRLF. Only `getsplitindex` produces a reply.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{TimerClient, TimerCommand};
use crate::error::{Result, SplitError};

/// Connection settings for a LiveSplit Server
#[derive(Debug, Clone)]
pub struct LiveSplitConfig {
    pub host: String,
    pub port: u16,
    /// How long to wait for a `getsplitindex` reply
    pub query_timeout: Duration,
}

impl Default for LiveSplitConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 16834,
            query_timeout: Duration::from_millis(500),
        }
    }
}

struct Connection {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

/// TCP client for LiveSplit Server
pub struct LiveSplitClient {
    config: LiveSplitConfig,
    connection: Option<Connection>,
}

impl LiveSplitClient {
    pub fn new(config: LiveSplitConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    /// Open the connection if it is not already open
    pub fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let target = format!("{}:{}", self.config.host, self.config.port);
        let addr = target
            .to_socket_addrs()
            .map_err(|e| SplitError::Timer(format!("Cannot resolve {}: {}", target, e)))?
            .next()
            .ok_or_else(|| SplitError::Timer(format!("No address for {}", target)))?;

        let writer = TcpStream::connect_timeout(&addr, self.config.query_timeout * 4)
            .map_err(|e| SplitError::Timer(format!("Cannot connect to {}: {}", target, e)))?;
        writer.set_nodelay(true)?;
        writer.set_read_timeout(Some(self.config.query_timeout))?;
        let reader = BufReader::new(writer.try_clone()?);

        log::info!("Connected to LiveSplit at {}", target);
        self.connection = Some(Connection { writer, reader });
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            log::info!("Disconnected from LiveSplit");
        }
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.connect()?;
        let Some(connection) = self.connection.as_mut() else {
            return Err(SplitError::Timer("Not connected".to_string()));
        };

        if let Err(e) = connection.writer.write_all(format!("{}\r\n", line).as_bytes()) {
            // Drop the broken socket so the next command reconnects
            self.connection = None;
            return Err(SplitError::Timer(format!("Failed to send '{}': {}", line, e)));
        }
        Ok(())
    }
}

/// Wire form of a command
fn wire_command(command: TimerCommand) -> &'static str {
    match command {
        TimerCommand::Split => "startorsplit",
        TimerCommand::Skip => "skipsplit",
        TimerCommand::Undo => "unsplit",
        TimerCommand::Reset => "reset",
    }
}

/// Parse a `getsplitindex` reply; a stopped timer reports -1
fn parse_index(reply: &str) -> Result<usize> {
    let value: i64 = reply
        .trim()
        .parse()
        .map_err(|_| SplitError::Timer(format!("Unexpected split index reply: {:?}", reply.trim())))?;
    Ok(value.max(0) as usize)
}

impl TimerClient for LiveSplitClient {
    fn send(&mut self, command: TimerCommand) -> Result<()> {
        log::debug!("LiveSplit <- {}", wire_command(command));
        self.write_line(wire_command(command))
    }

    fn query_index(&mut self) -> Result<usize> {
        self.write_line("getsplitindex")?;
        let Some(connection) = self.connection.as_mut() else {
            return Err(SplitError::Timer("Not connected".to_string()));
        };

        let mut reply = String::new();
        match connection.reader.read_line(&mut reply) {
            Ok(0) => {
                self.connection = None;
                Err(SplitError::Timer("LiveSplit closed the connection".to_string()))
            }
            Ok(_) => parse_index(&reply),
            Err(e) => {
                // A late reply would be read as the answer to the next query
                self.connection = None;
                Err(SplitError::Timer(format!("No split index reply: {}", e)))
            }
        }
    }
}
