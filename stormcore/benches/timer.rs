use criterion::{criterion_group, criterion_main, Criterion};
use std::time::{Duration, Instant};
use stormcore::timer::{TimerHandle, TimerWheel};

fn arm_cancel(c: &mut Criterion) {
    c.bench_function("arm_cancel_1k", |b| {
        let now = Instant::now();
        b.iter(|| {
            let mut wheel: TimerWheel<u32> = TimerWheel::new();
            let mut handles = vec![TimerHandle::NULL; 1000];
            for (i, handle) in handles.iter_mut().enumerate() {
                wheel.arm(handle, i as u32, Duration::from_secs(1), None, now);
            }
            for handle in handles.iter_mut() {
                wheel.cancel(handle);
            }
        })
    });
}

fn expire(c: &mut Criterion) {
    c.bench_function("expire_1k", |b| {
        let now = Instant::now();
        b.iter(|| {
            let mut wheel: TimerWheel<u32> = TimerWheel::new();
            let mut handles = vec![TimerHandle::NULL; 1000];
            for (i, handle) in handles.iter_mut().enumerate() {
                wheel.arm(handle, i as u32, Duration::from_millis(i as u64), None, now);
            }
            let mut fired = 0;
            while wheel.next_due(now + Duration::from_secs(1)).is_some() {
                fired += 1;
            }
            assert_eq!(fired, 1000);
        })
    });
}

criterion_group!(benches, arm_cancel, expire);
criterion_main!(benches);
