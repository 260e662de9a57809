//! Minimal FTP client for mainframe uploads.
//!
//! Only what delivery needs: login, change directory, binary mode, delete
//! and store, over passive (`PASV`) or active (`PORT`) data connections.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use super::Transport;
use crate::config::FtpConfig;
use crate::error::{TransportError, TransportResult};

/// A parsed server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    /// 1xx
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// 2xx
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Split a reply line into code and text. `None` if it does not start with
/// a 3-digit code.
///
/// The separator after the code tells whether the reply continues
/// (`-`) or ends on this line (space).
pub fn parse_reply_line(line: &str) -> Option<(u16, bool, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let code = line.get(..3)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code: u16 = code.parse().ok()?;
    let rest = &line[3..];
    match rest.chars().next() {
        Some('-') => Some((code, true, &rest[1..])),
        Some(' ') => Some((code, false, &rest[1..])),
        None => Some((code, false, "")),
        _ => None,
    }
}

/// Address announced in a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
/// reply.
pub fn parse_pasv(text: &str) -> Option<SocketAddr> {
    let start = text.find('(')?;
    let end = text[start..].find(')')? + start;
    let numbers: Vec<u8> = text[start + 1..end]
        .split(',')
        .map(|n| n.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    if numbers.len() != 6 {
        return None;
    }
    let ip = Ipv4Addr::new(numbers[0], numbers[1], numbers[2], numbers[3]);
    let port = u16::from(numbers[4]) << 8 | u16::from(numbers[5]);
    Some(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Argument of a `PORT` command for a local IPv4 address.
pub fn port_argument(addr: SocketAddr) -> Option<String> {
    let IpAddr::V4(ip) = addr.ip() else {
        return None;
    };
    let [a, b, c, d] = ip.octets();
    let port = addr.port();
    Some(format!("{},{},{},{},{},{}", a, b, c, d, port >> 8, port & 0xff))
}

struct Control {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    local: SocketAddr,
}

/// FTP delivery to the mainframe.
pub struct FtpTransport {
    config: FtpConfig,
    control: Option<Control>,
}

impl FtpTransport {
    pub fn new(config: FtpConfig) -> Self {
        Self {
            config,
            control: None,
        }
    }

    async fn timed<T, F>(&self, fut: F) -> TransportResult<T>
    where
        F: Future<Output = TransportResult<T>>,
    {
        tokio::time::timeout(self.config.timeout, fut)
            .await
            .map_err(|_| TransportError::Timeout(self.config.timeout.as_secs()))?
    }

    async fn read_reply(&mut self) -> TransportResult<Reply> {
        let control = self.control.as_mut().ok_or(TransportError::NotConnected)?;
        let timeout = self.config.timeout;
        read_reply(&mut control.reader, timeout).await
    }

    /// Send a command and read its reply.
    async fn command(&mut self, command: &str) -> TransportResult<Reply> {
        let control = self.control.as_mut().ok_or(TransportError::NotConnected)?;
        control
            .writer
            .write_all(format!("{}\r\n", command).as_bytes())
            .await?;
        self.read_reply().await
    }

    /// Send a command and require one of `expected` as reply code.
    async fn expect(&mut self, command: &str, expected: &[u16]) -> TransportResult<Reply> {
        let reply = self.command(command).await?;
        if expected.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(protocol_error(command, reply))
        }
    }

    async fn open_data(&mut self) -> TransportResult<DataChannel> {
        if self.config.passive {
            let reply = self.expect("PASV", &[227]).await?;
            let addr = parse_pasv(&reply.text).ok_or_else(|| TransportError::Protocol {
                command: "PASV".to_string(),
                code: reply.code,
                message: format!("cannot read address from '{}'", reply.text),
            })?;
            let stream = self
                .timed(async { TcpStream::connect(addr).await.map_err(TransportError::from) })
                .await?;
            Ok(DataChannel::Connected(stream))
        } else {
            let local = self
                .control
                .as_ref()
                .ok_or(TransportError::NotConnected)?
                .local;
            let listener = TcpListener::bind(SocketAddr::new(local.ip(), 0)).await?;
            let argument = port_argument(listener.local_addr()?).ok_or_else(|| {
                TransportError::Connect("active mode needs an IPv4 control connection".to_string())
            })?;
            self.expect(&format!("PORT {}", argument), &[200]).await?;
            Ok(DataChannel::Listening(listener))
        }
    }
}

enum DataChannel {
    Connected(TcpStream),
    Listening(TcpListener),
}

impl DataChannel {
    async fn stream(self) -> std::io::Result<TcpStream> {
        match self {
            Self::Connected(stream) => Ok(stream),
            Self::Listening(listener) => Ok(listener.accept().await?.0),
        }
    }
}

impl Transport for FtpTransport {
    fn describe(&self) -> String {
        format!(
            "ftp://{}@{}:{}/{}",
            self.config.user,
            self.config.host,
            self.config.port,
            self.config.remote_dir.as_deref().unwrap_or_default()
        )
    }

    async fn connect(&mut self) -> TransportResult<()> {
        let address = (self.config.host.clone(), self.config.port);
        let stream = self
            .timed(async {
                TcpStream::connect(address)
                    .await
                    .map_err(|e| TransportError::Connect(e.to_string()))
            })
            .await?;
        let local = stream.local_addr()?;
        let (read, write) = stream.into_split();
        self.control = Some(Control {
            reader: BufReader::new(read),
            writer: write,
            local,
        });

        let greeting = self.read_reply().await?;
        if greeting.code != 220 {
            return Err(TransportError::Connect(format!(
                "{} {}",
                greeting.code, greeting.text
            )));
        }

        let user = format!("USER {}", self.config.user);
        let reply = self.expect(&user, &[230, 331]).await?;
        if reply.code == 331 {
            let pass = format!("PASS {}", self.config.password);
            self.command(&pass)
                .await
                .and_then(|reply| match reply.code {
                    230 | 202 => Ok(()),
                    _ => Err(protocol_error("PASS", reply)),
                })?;
        }

        if let Some(dir) = self.config.remote_dir.clone() {
            self.expect(&format!("CWD {}", dir), &[250, 200]).await?;
        }
        self.expect("TYPE I", &[200]).await?;
        Ok(())
    }

    async fn remove(&mut self, remote_name: &str) -> TransportResult<bool> {
        let command = format!("DELE {}", remote_name);
        let reply = self.command(&command).await?;
        match reply.code {
            250 | 200 => Ok(true),
            550 => Ok(false),
            _ => Err(protocol_error(&command, reply)),
        }
    }

    async fn upload(&mut self, local: &Path, remote_name: &str) -> TransportResult<u64> {
        let data = tokio::fs::read(local).await?;
        let channel = self.open_data().await?;

        let command = format!("STOR {}", remote_name);
        let reply = self.command(&command).await?;
        if !reply.is_preliminary() {
            return Err(protocol_error(&command, reply));
        }

        self.timed(async {
            let mut stream = channel.stream().await?;
            stream.write_all(&data).await?;
            stream.shutdown().await?;
            Ok::<(), TransportError>(())
        })
        .await?;

        let reply = self.read_reply().await?;
        if !reply.is_completion() {
            return Err(protocol_error(&command, reply));
        }
        Ok(data.len() as u64)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        if self.control.is_none() {
            return Ok(());
        }
        let result = self.command("QUIT").await.map(|_| ());
        self.control = None;
        result
    }
}

async fn read_reply(reader: &mut BufReader<OwnedReadHalf>, timeout: Duration) -> TransportResult<Reply> {
    let read = async {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(TransportError::Connect("connection closed by server".to_string()));
        }
        let (code, more, text) = parse_reply_line(&line).ok_or_else(|| TransportError::Protocol {
            command: "reply".to_string(),
            code: 0,
            message: line.trim_end().to_string(),
        })?;
        let mut text = text.to_string();

        // Multi-line reply ends with "<code> " on its own line
        if more {
            loop {
                line.clear();
                if reader.read_line(&mut line).await? == 0 {
                    return Err(TransportError::Connect("connection closed by server".to_string()));
                }
                if let Some((last, false, rest)) = parse_reply_line(&line) {
                    if last == code {
                        text.push('\n');
                        text.push_str(rest);
                        break;
                    }
                }
                text.push('\n');
                text.push_str(line.trim_end());
            }
        }
        Ok(Reply { code, text })
    };

    tokio::time::timeout(timeout, read)
        .await
        .map_err(|_| TransportError::Timeout(timeout.as_secs()))?
}

fn protocol_error(command: &str, reply: Reply) -> TransportError {
    // Never echo credentials
    let command = if command.starts_with("PASS") {
        "PASS".to_string()
    } else {
        command.to_string()
    };
    TransportError::Protocol {
        command,
        code: reply.code,
        message: reply.text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_parse_reply_line() {
        assert_eq!(parse_reply_line("220 Ready\r\n"), Some((220, false, "Ready")));
        assert_eq!(parse_reply_line("211-Features:\r\n"), Some((211, true, "Features:")));
        assert_eq!(parse_reply_line("250"), Some((250, false, "")));
        assert_eq!(parse_reply_line(" MDTM"), None);
        assert_eq!(parse_reply_line("ABC x"), None);
    }

    #[test]
    fn test_parse_pasv() {
        let addr = parse_pasv("Entering Passive Mode (10,0,0,5,195,80).").unwrap();
        assert_eq!(addr, "10.0.0.5:50000".parse().unwrap());
        assert!(parse_pasv("Entering Passive Mode").is_none());
        assert!(parse_pasv("(1,2,3,4,5)").is_none());
        assert!(parse_pasv("(1,2,3,4,5,300)").is_none());
    }

    #[test]
    fn test_port_argument() {
        let arg = port_argument("192.168.1.2:50000".parse().unwrap()).unwrap();
        assert_eq!(arg, "192,168,1,2,195,80");
        assert!(port_argument("[::1]:21".parse().unwrap()).is_none());
    }

    /// Scripted server: answers a login, a missing DELE, and one passive STOR.
    async fn scripted_server(listener: TcpListener) -> Vec<u8> {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);
        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_addr = data_listener.local_addr().unwrap();
        let mut received = Vec::new();

        write.write_all(b"220-Welcome\r\n220 Ready\r\n").await.unwrap();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let command = line.trim_end().to_string();
            let reply = match command.split(' ').next().unwrap_or_default() {
                "USER" => "331 Password required\r\n".to_string(),
                "PASS" => "230 Logged in\r\n".to_string(),
                "CWD" => "250 OK\r\n".to_string(),
                "TYPE" => "200 Binary\r\n".to_string(),
                "DELE" => "550 Not found\r\n".to_string(),
                "PASV" => format!(
                    "227 Entering Passive Mode ({}).\r\n",
                    port_argument(data_addr).unwrap()
                ),
                "STOR" => {
                    write.write_all(b"150 Opening data connection\r\n").await.unwrap();
                    let (mut data, _) = data_listener.accept().await.unwrap();
                    data.read_to_end(&mut received).await.unwrap();
                    "226 Transfer complete\r\n".to_string()
                }
                "QUIT" => {
                    write.write_all(b"221 Bye\r\n").await.unwrap();
                    break;
                }
                _ => "502 Not implemented\r\n".to_string(),
            };
            write.write_all(reply.as_bytes()).await.unwrap();
        }
        received
    }

    #[tokio::test]
    async fn test_upload_against_scripted_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(scripted_server(listener));

        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("CPQMIGPN.csv");
        std::fs::write(&local, "A|B\n1|2\n").unwrap();

        let mut ftp = FtpTransport::new(FtpConfig {
            host: "127.0.0.1".to_string(),
            port,
            user: "cpq".to_string(),
            password: "secret".to_string(),
            remote_dir: Some("/cpq".to_string()),
            passive: true,
            timeout: Duration::from_secs(5),
        });

        ftp.connect().await.unwrap();
        assert!(!ftp.remove("CPQMIGPN.csv").await.unwrap());
        assert_eq!(ftp.upload(&local, "CPQMIGPN.csv").await.unwrap(), 8);
        ftp.disconnect().await.unwrap();

        assert_eq!(server.await.unwrap(), b"A|B\n1|2\n");
    }

    #[tokio::test]
    async fn test_commands_need_connection() {
        let mut ftp = FtpTransport::new(FtpConfig {
            host: "127.0.0.1".to_string(),
            port: 21,
            user: "cpq".to_string(),
            password: String::new(),
            remote_dir: None,
            passive: true,
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(
            ftp.remove("x").await,
            Err(TransportError::NotConnected)
        ));
        ftp.disconnect().await.unwrap();
    }
}
