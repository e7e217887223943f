// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use gpiowatch_sim::{Bank, Error, Simpleton};
use gpiowatch_uapi::{
    has_event, ControlOp, Device, WatchEventKind, WatchEventRecord, RECORD_SIZE,
};
use std::os::unix::io::AsFd;

fn read_record(d: &dyn Device) -> WatchEventRecord {
    let mut buf = [0_u8; RECORD_SIZE];
    assert_eq!(d.read_records(&mut buf).unwrap(), RECORD_SIZE);
    WatchEventRecord::from_slice(&buf).unwrap()
}

#[test]
fn builder() {
    let sim = gpiowatch_sim::builder()
        .with_name("veintidós")
        .with_bank(Bank::new(8, "left").name(3, "banana").hog(5, "hogster"))
        .with_bank(&Bank::new(12, "right"))
        .live()
        .unwrap();
    assert_eq!(sim.name(), "veintidós");
    assert_eq!(sim.chips().len(), 2);

    let c = &sim.chips()[0];
    assert_eq!(c.chip_name, "veintidós-0");
    let d = c.open().unwrap();
    let info = d.chip_info().unwrap();
    assert_eq!(info.name.as_os_str(), "veintidós-0");
    assert_eq!(info.label.as_os_str(), "left");
    assert_eq!(info.num_lines, 8);
    assert_eq!(d.line_name(3).unwrap().as_os_str(), "banana");
    assert!(d.line_name(2).unwrap().is_empty());
    assert!(c.is_requested(5).unwrap());
    assert!(!c.is_requested(3).unwrap());

    let d = sim.chips()[1].open().unwrap();
    assert_eq!(d.chip_info().unwrap().num_lines, 12);
}

#[test]
fn builder_invalid_config() {
    let res = gpiowatch_sim::builder()
        .with_bank(Bank::new(4, "short").name(4, "banana"))
        .live();
    assert!(matches!(res, Err(Error::InvalidConfig(_))));
}

#[test]
fn watch_unwatch() {
    let s = Simpleton::new(4);
    let d = s.open().unwrap();

    assert!(d.control(1, ControlOp::Watch).is_ok());
    assert_eq!(
        d.control(1, ControlOp::Watch).unwrap_err().errno(),
        Some(libc::EBUSY)
    );
    assert!(d.control(1, ControlOp::Unwatch).is_ok());
    assert_eq!(
        d.control(1, ControlOp::Unwatch).unwrap_err().errno(),
        Some(libc::EBUSY)
    );
    assert_eq!(
        d.control(4, ControlOp::Watch).unwrap_err().errno(),
        Some(libc::EINVAL)
    );
}

#[test]
fn events_only_for_watched_lines() {
    let s = Simpleton::new(4);
    let d = s.open().unwrap();

    s.request(1).unwrap();
    assert!(!has_event(d.as_fd()).unwrap());
    s.release(1).unwrap();

    d.control(1, ControlOp::Watch).unwrap();
    s.request(1).unwrap();
    s.reconfigure(1).unwrap();
    s.release(1).unwrap();
    s.request(2).unwrap();
    assert!(has_event(d.as_fd()).unwrap());

    let r = read_record(&d);
    assert_eq!(r.kind, WatchEventKind::Requested);
    assert_eq!(r.offset, 1);
    let r2 = read_record(&d);
    assert_eq!(r2.kind, WatchEventKind::ConfigChanged);
    assert!(r2.timestamp_ns >= r.timestamp_ns);
    assert_eq!(read_record(&d).kind, WatchEventKind::Released);
    assert!(!has_event(d.as_fd()).unwrap());
}

#[test]
fn devices_have_independent_watches() {
    let s = Simpleton::new(4);
    let d1 = s.open().unwrap();
    let d2 = s.open().unwrap();

    d1.control(2, ControlOp::Watch).unwrap();
    // watches are per device, so both may watch the same line
    d2.control(2, ControlOp::Watch).unwrap();
    d2.control(2, ControlOp::Unwatch).unwrap();

    s.request(2).unwrap();
    assert!(has_event(d1.as_fd()).unwrap());
    assert!(!has_event(d2.as_fd()).unwrap());
}

#[test]
fn actor_errors() {
    let s = Simpleton::new(4);
    assert!(matches!(s.release(0), Err(Error::NotRequested(0))));
    assert!(matches!(s.reconfigure(0), Err(Error::NotRequested(0))));
    s.request(0).unwrap();
    assert!(matches!(s.request(0), Err(Error::Busy(0))));
    assert!(matches!(s.request(4), Err(Error::InvalidOffset(4))));
}

#[test]
fn device_actor_ops() {
    let s = Simpleton::new(4);
    let d = s.open().unwrap();
    d.control(3, ControlOp::Watch).unwrap();

    d.control(3, ControlOp::Request).unwrap();
    assert_eq!(
        d.control(3, ControlOp::Request).unwrap_err().errno(),
        Some(libc::EBUSY)
    );
    assert!(s.chip().is_requested(3).unwrap());
    d.control(3, ControlOp::Release).unwrap();
    assert_eq!(read_record(&d).kind, WatchEventKind::Requested);
    assert_eq!(read_record(&d).kind, WatchEventKind::Released);
}

#[test]
fn full_queue_drops_events() {
    let s = Simpleton::new(1);
    let d = s.open().unwrap();
    d.control(0, ControlOp::Watch).unwrap();

    // well beyond the default pipe capacity
    for _ in 0..2500 {
        s.request(0).unwrap();
        s.release(0).unwrap();
    }
    assert!(s.chip().dropped() > 0);

    // queued events remain readable
    assert_eq!(read_record(&d).kind, WatchEventKind::Requested);
}

#[test]
fn inject() {
    let s = Simpleton::new(1);
    let d = s.open().unwrap();
    s.inject(&[1, 2, 3]);
    let mut buf = [0_u8; RECORD_SIZE];
    assert_eq!(d.read_records(&mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], &[1, 2, 3]);
}

#[test]
fn inject_overflow_is_dropped() {
    let s = Simpleton::new(1);
    let d = s.open().unwrap();
    let data = vec![0xa5_u8; 128 * 1024];
    s.inject(&data);
    assert_eq!(s.chip().dropped(), 1);

    // only the part that fit is queued
    let mut buf = vec![0_u8; data.len()];
    let mut queued = 0;
    while has_event(d.as_fd()).unwrap() {
        queued += d.read_records(&mut buf[queued..]).unwrap();
    }
    assert!(queued > 0);
    assert!(queued < data.len());
    assert!(buf[..queued].iter().all(|&b| b == 0xa5));

    // a write that fits is not dropped
    s.inject(&data[..RECORD_SIZE]);
    assert_eq!(s.chip().dropped(), 1);
    assert_eq!(d.read_records(&mut buf).unwrap(), RECORD_SIZE);
}

#[test]
fn drop_closes_queue() {
    let s = Simpleton::new(2);
    let d = s.open().unwrap();
    d.control(0, ControlOp::Watch).unwrap();
    s.request(0).unwrap();
    drop(s);

    // queued events are still available, then the end of stream
    assert_eq!(read_record(&d).kind, WatchEventKind::Requested);
    let mut buf = [0_u8; RECORD_SIZE];
    assert_eq!(d.read_records(&mut buf).unwrap(), 0);
    assert_eq!(
        d.control(0, ControlOp::Request).unwrap_err().errno(),
        Some(libc::ENODEV)
    );
}
