mod common;

use resock::{
  AddressFamily, BlockingMode, ConnectStatus, Endpoint, Inheritance,
  SocketConfig, TcpSocket, Transfer,
};

fn recv_exact(socket: &TcpSocket, len: usize) -> Vec<u8> {
  let mut out = vec![0u8; len];
  let mut got = 0;
  while got < len {
    match socket.recv(&mut out[got..]).unwrap() {
      Transfer::Progressed(n) => got += n,
      other => panic!("unexpected {other:?} after {got} bytes"),
    }
  }
  out
}

#[test]
fn test_hello_world_over_ephemeral_port() {
  common::init_logger();

  let listener = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  listener.bind(&common::loopback()).unwrap();
  listener.listen(resock::DEFAULT_BACKLOG).unwrap();
  let addr = listener.local_endpoint().unwrap();
  assert_ne!(addr.port(), 0);

  let client = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  assert_eq!(client.connect(&addr).unwrap(), ConnectStatus::Connected);

  let (server, peer) = listener.accept().unwrap().expect("pending connection");
  assert_eq!(peer, client.local_endpoint().unwrap());
  assert_eq!(server.peer_endpoint().unwrap(), peer);

  assert_eq!(client.send(b"hello").unwrap(), Transfer::Progressed(5));
  assert_eq!(recv_exact(&server, 5), b"hello");

  assert_eq!(server.send(b"world").unwrap(), Transfer::Progressed(5));
  assert_eq!(recv_exact(&client, 5), b"world");
}

#[test]
fn test_ipv6_loopback() {
  let listener = TcpSocket::new(AddressFamily::Ipv6).unwrap();
  if listener.bind(&Endpoint::parse("::1", 0).unwrap()).is_err() {
    // No IPv6 loopback on this host.
    return;
  }
  listener.listen(4).unwrap();
  let addr = listener.local_endpoint().unwrap();
  assert_eq!(addr.family(), Some(AddressFamily::Ipv6));

  let client = TcpSocket::new(AddressFamily::Ipv6).unwrap();
  client.connect(&addr).unwrap();

  let (server, peer) = listener.accept().unwrap().unwrap();
  assert_eq!(server.config().family(), AddressFamily::Ipv6);
  assert_eq!(peer.family(), Some(AddressFamily::Ipv6));
}

#[test]
fn test_connect_refused() {
  let (_guard, addr) = common::refusing_endpoint();

  let client = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  let err = client.connect(&addr).unwrap_err();
  assert_eq!(err.op(), Some("connect"));
  assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
}

#[test]
fn test_accepted_socket_inherits_listener_modes() {
  let config = SocketConfig::tcp(AddressFamily::Ipv4)
    .blocking(BlockingMode::NonBlocking)
    .inheritance(Inheritance::NonInheritable);
  let listener = TcpSocket::open(config).unwrap();
  listener.bind(&common::loopback()).unwrap();
  listener.listen(4).unwrap();
  assert!(listener.accept().unwrap().is_none());

  let client = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  client.connect(&listener.local_endpoint().unwrap()).unwrap();

  let mut accepted = None;
  while accepted.is_none() {
    accepted = listener.accept().unwrap();
  }
  let (server, _) = accepted.unwrap();
  assert!(server.config().is_nonblocking());
  assert!(!server.config().is_inheritable());

  #[cfg(unix)]
  {
    let flags = unsafe { libc::fcntl(server.raw(), libc::F_GETFD) };
    assert_ne!(flags & libc::FD_CLOEXEC, 0);
    let flags = unsafe { libc::fcntl(server.raw(), libc::F_GETFL) };
    assert_ne!(flags & libc::O_NONBLOCK, 0);
  }
}

#[test]
fn test_bind_reuses_address() {
  let first = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  first.bind(&common::loopback()).unwrap();
  first.listen(4).unwrap();
  let addr = first.local_endpoint().unwrap();

  // Leave a connection in TIME_WAIT on the port, then rebind it.
  let client = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  client.connect(&addr).unwrap();
  let (mut server, _) = first.accept().unwrap().unwrap();
  server.close();
  drop(first);
  drop(client);

  let second = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  second.bind(&addr).unwrap();
  assert_eq!(second.local_endpoint().unwrap(), addr);
}
