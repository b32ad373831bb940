#![allow(dead_code)]

use resock::{
  Acceptor, AddressFamily, ConnectStatus, Connection, Endpoint, Task,
  TcpSocket,
};

/// Upper bound on resumptions before a test gives up on a task.
const MAX_STEPS: usize = 1_000_000;

pub fn init_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

pub fn loopback() -> Endpoint {
  Endpoint::parse("127.0.0.1", 0).unwrap()
}

/// A listening acceptor on an ephemeral loopback port.
pub fn acceptor() -> (Acceptor, Endpoint) {
  let acceptor = Acceptor::bind(loopback(), 16).expect("bind acceptor");
  let addr = acceptor.local_endpoint().expect("acceptor endpoint");
  (acceptor, addr)
}

/// Client and server ends of one loopback connection.
pub fn connected_pair() -> (Connection, Connection) {
  let (acceptor, addr) = acceptor();
  let client = Connection::new(AddressFamily::Ipv4).unwrap();
  client.async_connect(addr).get().expect("connect");
  let server = acceptor.async_accept().get().expect("accept");
  (client, server)
}

/// Client and server ends of one loopback connection, both blocking.
pub fn blocking_pair() -> (TcpSocket, TcpSocket) {
  let listener = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  listener.bind(&loopback()).unwrap();
  listener.listen(16).unwrap();
  let addr = listener.local_endpoint().unwrap();

  let client = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  assert_eq!(client.connect(&addr).unwrap(), ConnectStatus::Connected);
  let (server, _) = listener.accept().unwrap().expect("pending connection");
  (client, server)
}

/// A bound socket that is not listening, so connects to its endpoint are
/// refused. Keep the socket alive for as long as the endpoint is used.
pub fn refusing_endpoint() -> (TcpSocket, Endpoint) {
  let socket = TcpSocket::new(AddressFamily::Ipv4).unwrap();
  socket.bind(&loopback()).unwrap();
  let addr = socket.local_endpoint().unwrap();
  (socket, addr)
}

/// Resumes `task` until it completes.
pub fn drive<T>(task: &mut Task<'_, T>) {
  for _ in 0..MAX_STEPS {
    if task.resume().is_ready() {
      return;
    }
    std::thread::yield_now();
  }
  panic!("task did not complete after {MAX_STEPS} steps");
}

pub fn payload(len: usize, seed: u64) -> Vec<u8> {
  let mut rng = fastrand::Rng::with_seed(seed);
  (0..len).map(|_| rng.u8(..)).collect()
}
