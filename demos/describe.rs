//! Describe demo - print the interface schema a dispatcher answers with.
//!
//! ```text
//! cargo run --example describe
//! ```

use std::sync::Arc;

use surfacewire::control::InterfaceSchema;
use surfacewire::handler::Dispatcher;
use surfacewire::protocol::DESCRIBE_TRANSACTION;
use surfacewire::transport::{LocalTransport, Transport};
use surfacewire::{BufferQueue, Capabilities, Parcel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for capabilities in [Capabilities::BASE, Capabilities::EXTENDED] {
        let queue = Arc::new(BufferQueue::builder().capabilities(capabilities).build());
        let dispatcher = Arc::new(Dispatcher::with_capabilities(queue, capabilities));
        let transport = LocalTransport::new(dispatcher);

        let mut reply = transport.transact(DESCRIBE_TRANSACTION, Parcel::new(), 0)?;
        let schema = InterfaceSchema::from_json(&reply.read_string()?)?;

        println!("{}", serde_json::to_string_pretty(&schema)?);
    }
    Ok(())
}
