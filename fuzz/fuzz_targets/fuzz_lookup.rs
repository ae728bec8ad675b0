#![no_main]
use libfuzzer_sys::fuzz_target;
use std::net::Ipv4Addr;

// Input layout: 4 bytes of address, then the database bytes.
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let ip = Ipv4Addr::new(data[0], data[1], data[2], data[3]);
    let bytes = &data[4..];

    let db = match qqwry::Database::from_bytes(bytes.to_vec()) {
        Ok(db) => db,
        Err(_) => return,
    };

    let _ = db.lookup(ip);
    let _ = db.lookup(Ipv4Addr::UNSPECIFIED);
    let _ = db.lookup(Ipv4Addr::BROADCAST);

    for entry in db.index().entries().take(64).flatten() {
        let _ = db.records().decode(entry.record_offset as usize);
    }
});
