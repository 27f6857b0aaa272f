//! TCP alert server module
//!
//! Accepts one client at a time on the alert port and hands the connection
//! to the protocol handler until the client goes away.

use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::Timer;
use log::{info, warn};

use crate::protocol::{AlertLink, ProtocolHandler};
use crate::{AlertError, config};

impl AlertLink for TcpSocket<'_> {
    fn pending(&self) -> usize {
        self.recv_queue()
    }

    fn is_open(&self) -> bool {
        self.may_recv() || self.can_recv()
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AlertError> {
        TcpSocket::read(self, buf).await.map_err(|_| AlertError::Link)
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), AlertError> {
        embedded_io_async::Write::write_all(self, bytes)
            .await
            .map_err(|_| AlertError::Link)?;
        self.flush().await.map_err(|_| AlertError::Link)
    }
}

/// TCP server for the alert socket
pub struct TcpServer<'a> {
    port: u16,
    stack: Stack<'a>,
}

impl<'a> TcpServer<'a> {
    /// Create a new TCP server instance
    pub fn new(stack: Stack<'a>, port: u16) -> Self {
        Self { port, stack }
    }

    /// Get the listening port
    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Accept and serve clients forever, one at a time
    pub async fn run(&self, handler: &ProtocolHandler<'_>) -> ! {
        info!("[TCP] Waiting for network configuration...");
        self.stack.wait_config_up().await;
        if let Some(ipv4) = self.stack.config_v4() {
            info!(
                "[TCP] Listening for connections on {}:{}",
                ipv4.address.address(),
                self.port
            );
        }

        let mut rx_buffer = [0u8; config::TCP_RX_BUFFER_SIZE];
        let mut tx_buffer = [0u8; config::TCP_TX_BUFFER_SIZE];

        loop {
            let mut socket = TcpSocket::new(self.stack, &mut rx_buffer, &mut tx_buffer);
            // A peer that vanishes without FIN/RST would otherwise hold the only slot
            socket.set_keep_alive(Some(config::TCP_KEEP_ALIVE));
            socket.set_timeout(Some(config::TCP_TIMEOUT));

            match socket.accept(self.port).await {
                Ok(()) => {
                    info!("[TCP] Client connected from {:?}", socket.remote_endpoint());
                    handler.serve(&mut socket).await;

                    socket.close();
                    if let Err(e) = socket.flush().await {
                        warn!("[TCP] Error while closing connection: {:?}", e);
                    }
                    socket.abort();
                    info!("[TCP] Client disconnected");
                }
                Err(e) => {
                    warn!("[TCP] Accept failed: {:?}", e);
                }
            }

            Timer::after(config::ACCEPT_INTERVAL).await;
        }
    }
}
