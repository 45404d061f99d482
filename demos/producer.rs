//! Producer demo - render frames into a buffer queue over a channel.
//!
//! This example demonstrates:
//! - Serving a [`BufferQueue`] through a dispatcher task
//! - Negotiating capabilities from the producer side
//! - The dequeue / request / queue cycle with a consumer draining frames
//!
//! ```text
//! cargo run --example producer
//! ```

use std::sync::Arc;
use std::time::Duration;

use surfacewire::handle::{format, usage};
use surfacewire::handler::Dispatcher;
use surfacewire::transport::{spawn_dispatcher_task, ChannelConfig};
use surfacewire::{
    Api, BufferQueue, Capabilities, DequeueFlags, Fence, QueueBufferInput, Rect, ScalingMode,
    SurfaceTexture, SurfaceTextureProxy, Transform,
};

const FRAMES: i64 = 8;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let queue = Arc::new(
        BufferQueue::builder()
            .name("demo-surface")
            .default_size(640, 480)
            .synchronous(true)
            .default_buffer_count(3)
            .dequeue_timeout(Duration::from_secs(1))
            .capabilities(Capabilities::EXTENDED)
            .build(),
    );

    let dispatcher = Arc::new(Dispatcher::with_capabilities(
        Arc::clone(&queue),
        queue.capabilities(),
    ));
    let (transport, serve_task) = spawn_dispatcher_task(dispatcher, ChannelConfig::default());

    // Consumer: latch and release whatever the producer queues.
    let consumer = {
        let queue = Arc::clone(&queue);
        tokio::task::spawn_blocking(move || -> surfacewire::Result<i64> {
            let mut consumed = 0;
            while consumed < FRAMES {
                match queue.acquire_buffer()? {
                    Some(frame) => {
                        println!(
                            "consumer: frame {} from slot {} (t={})",
                            frame.frame_number, frame.slot, frame.timestamp
                        );
                        queue.release_with_fence(frame.slot, Fence::no_fence())?;
                        consumed += 1;
                    }
                    None => std::thread::sleep(Duration::from_millis(2)),
                }
            }
            Ok(consumed)
        })
    };

    // Producer: blocking calls, so off the runtime.
    let producer = tokio::task::spawn_blocking(move || -> surfacewire::Result<_> {
        let proxy = SurfaceTextureProxy::negotiate(transport, Capabilities::EXTENDED)?;
        println!(
            "producer: connected to {:?} (extended={})",
            proxy.get_id()?,
            proxy.capabilities().extended
        );

        let output = proxy.connect(Api::Cpu)?;
        println!("producer: consumer size {}x{}", output.width, output.height);

        for t in 0..FRAMES {
            let out = proxy.dequeue_buffer(640, 480, format::RGBA_8888, usage::SW_WRITE_OFTEN)?;
            if out.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION) {
                let buffer = proxy.request_buffer(out.slot)?;
                println!("producer: slot {} bound to {:?}", out.slot, buffer.map(|b| b.id));
            }

            let input = QueueBufferInput::new(
                t * 16_666_667,
                Rect::from_size(640, 480),
                ScalingMode::Freeze,
                Transform::IDENTITY,
                Fence::no_fence(),
            );
            let output = proxy.queue_buffer(out.slot, input)?;
            println!("producer: queued slot {} ({} pending)", out.slot, output.num_pending_buffers);
        }

        Ok(proxy)
    });

    let proxy = producer.await??;
    let consumed = consumer.await??;
    println!("done: {} frames", consumed);

    // Disconnecting frees every slot, so wait for the consumer first.
    tokio::task::spawn_blocking(move || proxy.disconnect(Api::Cpu)).await??;

    serve_task.await?;
    Ok(())
}
