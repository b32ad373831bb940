mod common;

use std::{cell::Cell, rc::Rc};

use resock::{Error, Status, Task};

#[test]
fn test_task_is_lazy() {
  let (client, server) = common::connected_pair();

  let mut buf = [0u8; 5];
  let read = server.async_read(&mut buf);
  assert_eq!(read.status(), Status::NotStarted);

  // Data written after the read was created is still seen by it.
  client.async_write(b"later").get().unwrap();
  assert_eq!(read.get(), Ok(5));
  assert_eq!(&buf, b"later");
}

#[test]
fn test_composed_tasks() {
  let (client, server) = common::connected_pair();

  let mut buf = [0u8; 4];
  let exchange = Task::new(async {
    client.async_write(b"ping").await?;
    let mut got = 0;
    while got < buf.len() {
      got += server.async_read(&mut buf[got..]).await?;
    }
    Ok::<_, Error>(got)
  });

  assert_eq!(exchange.get(), Ok(4));
  assert_eq!(&buf, b"ping");
}

#[test]
fn test_failure_is_stored_until_retrieved() {
  let (client, _server) = common::connected_pair();
  client.close();

  let polled = Rc::new(Cell::new(0));
  let mut task = Task::new({
    let polled = polled.clone();
    let client = &client;
    async move {
      polled.set(polled.get() + 1);
      client.async_write(b"x").await
    }
  });

  assert!(task.resume().is_ready());
  assert_eq!(
    task.output(),
    Some(&Err(Error::Usage("write on closed connection")))
  );
  assert!(task.resume().is_ready());
  assert_eq!(polled.get(), 1);
  assert!(task.get().unwrap_err().is_usage());
}
