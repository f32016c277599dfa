// https://www.openssh.com/txt/socks4.protocol
// https://www.openssh.com/txt/socks4a.protocol

use std::net::Ipv4Addr;

pub const VERSION: u8 = 4;

pub const CMD_CONNECT: u8 = 0x01;
pub const CMD_BIND: u8 = 0x02;

/// Placeholder DSTIP telling a 4a proxy to resolve the trailing hostname itself.
pub const SOCKS4A_ADDRESS: [u8; 4] = [0, 0, 0, 1];

/// VN, CD, DSTPORT and DSTIP. Every request and every reply carries at least this.
pub const HEADER_LEN: usize = 8;
pub const REPLY_LEN: usize = 8;

pub const RESP_VERSION: u8 = 0;
pub const RESP_CODE_GRANTED: u8 = 0x5a;
pub const RESP_CODE_REJECTED: u8 = 0x5b;
pub const RESP_CODE_IDENT_UNREACHABLE: u8 = 0x5c;
pub const RESP_CODE_IDENT_MISMATCH: u8 = 0x5d;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("user id contains a NUL byte")]
    UserIdContainsNul,
    #[error("host {0:?} contains a NUL byte")]
    HostContainsNul(String),
    #[error("host is empty")]
    EmptyHost,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, int_enum::IntEnum)]
pub enum Command {
    Connect = CMD_CONNECT,
    Bind = CMD_BIND,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, int_enum::IntEnum)]
pub enum ReplyCode {
    Granted = RESP_CODE_GRANTED,
    Rejected = RESP_CODE_REJECTED,
    /// The proxy could not reach identd on the client.
    IdentUnreachable = RESP_CODE_IDENT_UNREACHABLE,
    /// identd and the request disagree on the user id.
    IdentMismatch = RESP_CODE_IDENT_MISMATCH,
}

/// Destination as it goes on the wire.
///
/// `Ipv4` is plain SOCKS4. `Domain` is the 4a form: DSTIP carries
/// [`SOCKS4A_ADDRESS`] and the name follows the user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Ipv4(Ipv4Addr),
    Domain(String),
}

impl Address {
    pub fn ip(&self) -> Ipv4Addr {
        match self {
            Address::Ipv4(ip) => *ip,
            Address::Domain(_) => Ipv4Addr::from(SOCKS4A_ADDRESS),
        }
    }
}

impl From<Ipv4Addr> for Address {
    fn from(value: Ipv4Addr) -> Self {
        Address::Ipv4(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    pub command: Command,
    pub address: Address,
    pub port: u16,
    pub user_id: &'a str,
}

impl<'a> Request<'a> {
    pub fn connect(address: Address, port: u16, user_id: &'a str) -> Request<'a> {
        Request {
            command: Command::Connect,
            address,
            port,
            user_id,
        }
    }

    // +----+----+----+----+----+----+----+----+----+----+....+----+....+----+
    // | VN | CD | DSTPORT |      DSTIP        | USERID       |NULL| HOST |NULL|
    // +----+----+----+----+----+----+----+----+----+----+....+----+....+----+
    //    1    1      2              4           variable       1   (4a only)
    pub fn to_buf(&self) -> Result<Vec<u8>, BuildError> {
        if self.user_id.as_bytes().contains(&0) {
            return Err(BuildError::UserIdContainsNul);
        }

        let host = match &self.address {
            Address::Ipv4(_) => None,
            Address::Domain(host) if host.is_empty() => return Err(BuildError::EmptyHost),
            Address::Domain(host) if host.as_bytes().contains(&0) => {
                return Err(BuildError::HostContainsNul(host.clone()))
            }
            Address::Domain(host) => Some(host.as_bytes()),
        };

        let mut buf = Vec::with_capacity(
            HEADER_LEN + self.user_id.len() + 1 + host.map_or(0, |h| h.len() + 1),
        );
        buf.push(VERSION);
        buf.push(self.command as u8);
        buf.extend_from_slice(&self.port.to_be_bytes());
        buf.extend_from_slice(&self.address.ip().octets());
        buf.extend_from_slice(self.user_id.as_bytes());
        buf.push(0);

        if let Some(host) = host {
            buf.extend_from_slice(host);
            buf.push(0);
        }

        Ok(buf)
    }
}

// +----+----+----+----+----+----+----+----+
// | VN | CD | DSTPORT |      DSTIP        |
// +----+----+----+----+----+----+----+----+
//    1    1      2              4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub version: u8,
    pub code: u8,
    pub port: u16,
    pub ip: Ipv4Addr,
}

impl Reply {
    pub fn code(&self) -> Result<ReplyCode, u8> {
        ReplyCode::try_from(self.code)
    }
}

impl From<[u8; REPLY_LEN]> for Reply {
    fn from(value: [u8; REPLY_LEN]) -> Self {
        Reply {
            version: value[0],
            code: value[1],
            port: u16::from_be_bytes([value[2], value[3]]),
            ip: Ipv4Addr::new(value[4], value[5], value[6], value[7]),
        }
    }
}
