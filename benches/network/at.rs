use criterion::{Criterion, Throughput};
use libnbiot::cellular::Urc;
use libnbiot::network::Write;
use libnbiot::network::at::{AtClient, CommandExecutor, URC_CAPACITY};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct NullLink;

impl Write for NullLink {
    type Error = libnbiot::network::error::Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub fn bench_ingress_demux(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingress_demux");
    // one channel's worth of notifications per iteration
    let traffic: Vec<u8> = (0..URC_CAPACITY / 2)
        .flat_map(|i| {
            if i % 4 == 0 {
                b"\r\n+QMTSTAT: 0,1\r\n".to_vec()
            } else {
                format!("\r\n+QMTRECV: 0,{},\"/a1p8Pngb3oY/BC28/user/get\",\"{{seq:{}}}\"\r\n", i, i)
                    .into_bytes()
            }
        })
        .collect();
    group.throughput(Throughput::Bytes(traffic.len() as u64));

    let (client, mut ingress, mut dispatcher) = AtClient::<_, Urc>::new(NullLink);
    client.init(256).expect("init");
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();
    client.set_urc_handler(Arc::new(move |_: &Urc| {
        counter.fetch_add(1, Ordering::Relaxed);
    }));

    group.bench_function("feed_and_dispatch", |b| {
        b.iter(|| {
            ingress.feed(&traffic);
            dispatcher.dispatch_pending()
        })
    });
    group.finish();
}
