use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use log::{debug, trace};
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{sleep_until, timeout, Instant};

use crate::challenge::{find_challenge, ChallengeReply};
use crate::config::{normalize_address, ClientOptions};
use crate::error::{Result, SourceQueryError};
use crate::fragment::{Fragment, Reassembler};
use crate::info::ServerInfo;
use crate::packet::{PacketHeader, PacketType, RequestPacket, CHALLENGE_PLACEHOLDER};
use crate::players::Players;
use crate::ping;
use crate::rules::Rules;

/// A connection to one game server's query port.
///
/// Every send and every receive is bounded by [ClientOptions::timeout]. Note
/// that a query performs several of those:
/// - On packet send
/// - On packet receive
/// - Twice more on another send and receive, if challenged
/// - Once more per additional fragment of a split answer
///
/// Queries take `&mut self`; one client runs one query at a time.
///
/// Example usage:
/// ```no_run
/// # async fn run() -> sourcequery::error::Result<()> {
/// use sourcequery::config::ClientOptions;
/// use sourcequery::query::Client;
///
/// let mut client = Client::new("nyc-1.us.uncletopia.com:27015", ClientOptions::default()).await?;
/// let info = client.info().await?;
/// println!("{} is playing {}", info.name, info.map);
/// client.close();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client {
    address: String,
    socket: UdpSocket,
    options: ClientOptions,
    buffer: Vec<u8>,
    next_query: Option<Instant>,
}

impl Client {
    /// Validate `options`, then resolve and connect to `address`.
    ///
    /// `address` defaults to port 27015 if it names none.
    pub async fn new(address: &str, options: ClientOptions) -> Result<Client> {
        options.validate()?;
        let address = normalize_address(address)?;

        let remote: SocketAddr = timeout(options.timeout, lookup_host(address.as_str()))
            .await?
            .map_err(SourceQueryError::UnreachableHost)?
            .next()
            .ok_or_else(|| {
                SourceQueryError::UnreachableHost(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{address} did not resolve to any address"),
                ))
            })?;

        // just arbitrarily bind any port of the matching family
        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket: UdpSocket = UdpSocket::bind(local)
            .await
            .map_err(SourceQueryError::FailedPortBind)?;

        timeout(options.timeout, socket.connect(remote))
            .await?
            .map_err(SourceQueryError::UnreachableHost)?;
        debug!("connected to {} ({})", address, remote);

        Ok(Client {
            address,
            socket,
            buffer: vec![0u8; options.max_datagram_size],
            options,
            next_query: None,
        })
    }

    /// The queried address, port included.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Query the server with A2S_INFO, answering a challenge if one is issued.
    pub async fn info(&mut self) -> Result<ServerInfo> {
        let request = RequestPacket::info(None);
        let mut reply = self.send_recv(&request).await?;

        if let Some(challenge) = find_challenge(&reply)? {
            debug!("info query challenged with {:02x?}", challenge);
            reply = self.send_recv(&request.with_challenge(challenge)).await?;
        }

        let payload = self.collect(reply).await?;
        ServerInfo::parse(&payload)
    }

    /// Query the server with A2S_PLAYER.
    pub async fn players(&mut self) -> Result<Players> {
        let payload = self
            .challenged_query(
                RequestPacket::players(CHALLENGE_PLACEHOLDER),
                PacketType::PlayersResponse,
            )
            .await?;
        Players::parse(&payload, self.options.is_the_ship())
    }

    /// Query the server with A2S_RULES.
    pub async fn rules(&mut self) -> Result<Rules> {
        let payload = self
            .challenged_query(
                RequestPacket::rules(CHALLENGE_PLACEHOLDER),
                PacketType::RulesResponse,
            )
            .await?;
        Rules::parse(&payload)
    }

    /// Is the server answering? A failed exchange is an error, never `false`.
    pub async fn ping(&mut self) -> Result<bool> {
        let reply = self.send_recv(&RequestPacket::ping()).await?;
        ping::parse(&reply)
    }

    /// Release the socket.
    pub fn close(self) {
        debug!("closing connection to {}", self.address);
    }

    /// Send `request` with the placeholder challenge, resend it with the
    /// real one if the server asks for it, and return the full answer.
    async fn challenged_query(
        &mut self,
        request: RequestPacket,
        full_result: PacketType,
    ) -> Result<Vec<u8>> {
        let reply = self.send_recv(&request).await?;

        let datagram = match ChallengeReply::classify(reply, full_result)? {
            ChallengeReply::Immediate(datagram) => datagram,
            ChallengeReply::Token(challenge) => {
                self.send_recv(&request.with_challenge(challenge)).await?
            }
        };

        self.collect(datagram).await
    }

    /// Turn the first datagram of an answer into the full answer, receiving
    /// the remaining fragments if it is split.
    async fn collect(&mut self, datagram: Vec<u8>) -> Result<Vec<u8>> {
        match PacketHeader::peek(&datagram)? {
            PacketHeader::Single => Ok(datagram),
            PacketHeader::Split => {
                let generation = self.options.engine_generation;
                let mut reassembler = Reassembler::new(Fragment::decode(&datagram, generation)?)?;

                while !reassembler.is_complete() {
                    trace!("waiting for {} more fragments", reassembler.missing());
                    let datagram = self.receive().await?;
                    reassembler.push(Fragment::decode(&datagram, generation)?)?;
                }

                reassembler.finish()
            }
        }
    }

    async fn send_recv(&mut self, request: &RequestPacket) -> Result<Vec<u8>> {
        self.send(request).await?;
        self.receive().await
    }

    async fn send(&mut self, request: &RequestPacket) -> Result<()> {
        if let Some(next_query) = self.next_query {
            sleep_until(next_query).await;
        }

        let packet = request.pack();
        let sent = timeout(self.options.timeout, self.socket.send(&packet)).await;
        self.schedule_next_query();

        sent?.map_err(SourceQueryError::SendError)?;
        trace!("sent {:?} ({} bytes)", request.packet_type(), packet.len());
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        let received = timeout(self.options.timeout, self.socket.recv(&mut self.buffer)).await;
        self.schedule_next_query();

        let size = received?.map_err(SourceQueryError::ReceiveError)?;
        trace!("received {} bytes", size);
        Ok(self.buffer[..size].to_vec())
    }

    fn schedule_next_query(&mut self) {
        if let Some(interval) = self.options.min_query_interval {
            self.next_query = Some(Instant::now() + interval);
        }
    }
}
