// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod common;

#[cfg(feature = "async_tokio")]
mod chip {
    use super::common::*;
    use gpiowatch::tokio::AsyncChip;
    use gpiowatch::{Error, EventKind};
    use gpiowatch_sim::Simpleton;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn read_watch_event() {
        let s = Simpleton::new(4);
        let c = new_chip(&s);
        let offset = 3;
        c.watch_line(offset).unwrap();
        let ac = AsyncChip::new(c).unwrap();

        let actor = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            s.request(offset).unwrap();
            s
        });
        let evt = ac.read_watch_event().await.unwrap();
        assert_eq!(evt.kind, EventKind::Requested);
        assert_eq!(evt.line.offset(), offset);

        let s = actor.join().unwrap();
        s.release(offset).unwrap();
        let evt = ac.read_watch_event().await.unwrap();
        assert_eq!(evt.kind, EventKind::Released);
        assert!(!ac.as_ref().has_watch_event().unwrap());
    }

    #[tokio::test]
    async fn read_watch_events() {
        let s = Simpleton::new(4);
        let c = new_chip(&s);
        c.watch_line(1).unwrap();
        let ac = AsyncChip::new(c).unwrap();

        s.request(1).unwrap();
        s.reconfigure(1).unwrap();
        s.release(1).unwrap();

        let mut events = Vec::new();
        assert_eq!(ac.read_watch_events(&mut events, 8).await.unwrap(), 3);
        assert_eq!(events[1].kind, EventKind::ConfigChanged);
    }

    #[tokio::test]
    async fn watch_events() {
        let s = Simpleton::new(4);
        let c = new_chip(&s);
        let offset = 2;
        c.watch_line(offset).unwrap();
        let ac = AsyncChip::new(c).unwrap();
        let mut events = ac.watch_events();

        s.request(offset).unwrap();
        let evt = events.next().await.unwrap().unwrap();
        assert_eq!(evt.kind, EventKind::Requested);
        assert_eq!(evt.line.offset(), offset);

        s.reconfigure(offset).unwrap();
        let evt = events.next().await.unwrap().unwrap();
        assert_eq!(evt.kind, EventKind::ConfigChanged);

        s.release(offset).unwrap();
        let evt = events.next().await.unwrap().unwrap();
        assert_eq!(evt.kind, EventKind::Released);

        // the stream ends when the chip is closed
        drop(s);
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn buffered_stream() {
        let s = Simpleton::new(4);
        let c = new_chip(&s);
        c.watch_line(0).unwrap();
        let ac = AsyncChip::new(c).unwrap();
        let mut events = ac.new_watch_event_stream(4);

        for _ in 0..3 {
            s.request(0).unwrap();
            s.release(0).unwrap();
        }
        let mut kinds = Vec::new();
        for _ in 0..6 {
            kinds.push(events.next().await.unwrap().unwrap().kind);
        }
        assert_eq!(
            kinds,
            [EventKind::Requested, EventKind::Released].repeat(3)
        );
    }

    #[tokio::test]
    async fn closed() {
        let s = Simpleton::new(4);
        let ac = AsyncChip::new(new_chip(&s)).unwrap();
        drop(s);
        assert!(matches!(ac.read_watch_event().await, Err(Error::Closed)));
        // and the chip remains usable
        let c = ac.into_inner();
        assert_eq!(c.num_lines(), 4);
        assert!(c.wait_watch_event(IDLE_WAIT).unwrap());
    }
}
