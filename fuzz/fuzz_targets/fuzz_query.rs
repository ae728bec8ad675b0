#![no_main]
use libfuzzer_sys::fuzz_target;
use qqwry::{Database, DatabaseBuilder, Locator};
use std::net::Ipv4Addr;
use std::sync::OnceLock;

fn locator() -> &'static Locator {
    static LOCATOR: OnceLock<Locator> = OnceLock::new();
    LOCATOR.get_or_init(|| {
        let mut builder = DatabaseBuilder::new();
        builder
            .add_range(
                Ipv4Addr::new(1, 0, 0, 0),
                Ipv4Addr::new(1, 255, 255, 255),
                "广东省深圳市南山区",
                "电信",
            )
            .unwrap()
            .add_range(
                Ipv4Addr::new(8, 8, 8, 0),
                Ipv4Addr::new(8, 8, 8, 255),
                "美国",
                "加利福尼亚州圣克拉拉县山景市谷歌公司DNS服务器",
            )
            .unwrap();
        let db = Database::from_bytes(builder.build().unwrap()).unwrap();
        Locator::from_database(db)
    })
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary address text, including ports and IPv6 forms
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(info) = locator().query(text) {
            let _ = info.full(" ");
        }
    }
});
