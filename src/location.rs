//! Structured location results
//!
//! QQWry stores one free-form region string per range ("广东省深圳市",
//! "美国 加利福尼亚州", ...) plus an operator string ("电信", "阿里云").
//! This module splits the region into province / city / district using
//! administrative suffixes and maps the operator onto a known carrier name.

use serde::Serialize;
use std::net::Ipv4Addr;

/// Value used for every field of a private-network result
pub const LOCAL: &str = "local";

/// Operator reported for private-network results
pub const PRIVATE_NETWORK: &str = "private network";

/// Text returned by [`LocationInfo::full`] when nothing is known
pub const UNKNOWN: &str = "未知";

/// Placeholder strings the database uses for "no data"
const PLACEHOLDERS: &[&str] = &["CZ88.NET", "IANA"];

/// Suffixes that end a province-level name
const PROVINCE_SUFFIXES: &[&str] = &["特别行政区", "自治区", "省", "市"];

/// Suffixes that end a city / county level name
const CITY_SUFFIXES: &[&str] = &["自治州", "地区", "市", "县", "区", "盟"];

/// Tokens are additionally split after any of these
const SPLIT_SUFFIXES: &[&str] = &["特别行政区", "自治区", "自治州", "省", "市", "县", "区", "盟"];

/// Provincial-level names that identify a domestic region
const DOMESTIC_REGIONS: &[&str] = &[
    "北京", "天津", "上海", "重庆", "河北", "山西", "辽宁", "吉林", "黑龙江", "江苏", "浙江",
    "安徽", "福建", "江西", "山东", "河南", "湖北", "湖南", "广东", "海南", "四川", "贵州",
    "云南", "陕西", "甘肃", "青海", "台湾", "内蒙古", "广西", "西藏", "宁夏", "新疆", "香港",
    "澳门",
];

/// Domestic country name
const CHINA: &str = "中国";

/// Known carriers: (substring to look for, canonical name)
const CARRIERS: &[(&str, &str)] = &[
    ("电信", "中国电信"),
    ("联通", "中国联通"),
    ("移动", "中国移动"),
    ("铁通", "中国铁通"),
    ("广电", "中国广电"),
    ("教育网", "教育网"),
    ("长城宽带", "长城宽带"),
    ("鹏博士", "鹏博士"),
    ("阿里云", "阿里云"),
    ("腾讯云", "腾讯云"),
    ("华为云", "华为云"),
    ("Cloudflare", "Cloudflare"),
    ("Google", "Google"),
    ("Amazon", "Amazon"),
    ("Microsoft", "Microsoft"),
];

/// Location of one IPv4 address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationInfo {
    /// Country name
    pub country: String,
    /// Province, state or top-level region
    pub province: String,
    /// City or prefecture
    pub city: String,
    /// District, county or anything finer
    pub district: String,
    /// Carrier name, or the raw operator text when unrecognized
    pub isp: String,
    /// The address that was resolved
    pub ip: String,
}

impl LocationInfo {
    /// Fixed result for loopback and private addresses
    pub fn local(ip: impl Into<String>) -> Self {
        Self {
            country: LOCAL.to_string(),
            province: LOCAL.to_string(),
            city: LOCAL.to_string(),
            district: LOCAL.to_string(),
            isp: PRIVATE_NETWORK.to_string(),
            ip: ip.into(),
        }
    }

    /// Build a result from decoded region and operator strings
    pub fn from_raw(ip: Ipv4Addr, region: &str, operator: &str) -> Self {
        let region = strip_placeholders(region);
        let Region {
            province,
            city,
            district,
        } = split_region(region);
        let country = country_of(region);
        let province = if province.is_empty() {
            country.clone()
        } else {
            province
        };

        Self {
            country,
            province,
            city,
            district,
            isp: isp_of(operator),
            ip: ip.to_string(),
        }
    }

    /// Province accessor
    pub fn province(&self) -> &str {
        &self.province
    }

    /// City accessor
    pub fn city(&self) -> &str {
        &self.city
    }

    /// District accessor
    pub fn district(&self) -> &str {
        &self.district
    }

    /// Join the non-empty geographic parts with `separator`
    ///
    /// Returns [`UNKNOWN`] when every part is empty.
    pub fn full(&self, separator: &str) -> String {
        let parts: Vec<&str> = [
            self.country.as_str(),
            self.province.as_str(),
            self.city.as_str(),
            self.district.as_str(),
        ]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();

        if parts.is_empty() {
            UNKNOWN.to_string()
        } else {
            parts.join(separator)
        }
    }
}

/// Region string split into administrative levels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    /// Province-level part
    pub province: String,
    /// City-level part
    pub city: String,
    /// Everything after the city
    pub district: String,
}

/// Split a region string into province, city and district
///
/// The first token ending in a province suffix closes the province; the first
/// later token ending in a city suffix closes the city; the rest is the
/// district. Without any province suffix the first two tokens are taken as
/// province and city.
pub fn split_region(region: &str) -> Region {
    let region = strip_placeholders(region);
    let region = region.strip_prefix(CHINA).unwrap_or(region);
    let tokens = tokenize(region);

    if tokens.is_empty() {
        return Region::default();
    }

    if let Some(p) = tokens.iter().position(|t| ends_with_any(t, PROVINCE_SUFFIXES)) {
        let province = tokens[..=p].concat();
        let rest = &tokens[p + 1..];

        return match rest.iter().position(|t| ends_with_any(t, CITY_SUFFIXES)) {
            Some(c) => Region {
                province,
                city: rest[..=c].concat(),
                district: rest[c + 1..].concat(),
            },
            None => Region {
                province,
                city: rest.concat(),
                district: String::new(),
            },
        };
    }

    match tokens.as_slice() {
        [only] if only.contains('市') => Region {
            city: only.to_string(),
            ..Region::default()
        },
        [only] => Region {
            province: only.to_string(),
            ..Region::default()
        },
        [first, second, rest @ ..] => Region {
            province: first.to_string(),
            city: second.to_string(),
            district: rest.concat(),
        },
        [] => Region::default(),
    }
}

/// Canonical carrier name for an operator string
///
/// Unrecognized operators are returned verbatim; placeholder text becomes
/// empty.
pub fn isp_of(operator: &str) -> String {
    let operator = strip_placeholders(operator);
    CARRIERS
        .iter()
        .find(|(needle, _)| operator.contains(needle))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| operator.to_string())
}

/// Country for a region string
pub fn country_of(region: &str) -> String {
    let region = strip_placeholders(region);
    let domestic = region.starts_with(CHINA)
        || DOMESTIC_REGIONS.iter().any(|name| region.starts_with(name));
    if domestic {
        CHINA.to_string()
    } else {
        region.to_string()
    }
}

/// Remove database placeholder markers and surrounding whitespace
fn strip_placeholders(text: &str) -> &str {
    let mut text = text.trim();
    for marker in PLACEHOLDERS {
        if let Some(rest) = text.strip_prefix(marker) {
            text = rest.trim_start();
        }
        if let Some(rest) = text.strip_suffix(marker) {
            text = rest.trim_end();
        }
    }
    text
}

/// Split on whitespace, then after administrative suffixes
fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for word in text.split_whitespace() {
        let mut start = 0;
        for (i, ch) in word.char_indices() {
            let end = i + ch.len_utf8();
            if end < word.len() && ends_with_any(&word[start..end], SPLIT_SUFFIXES) {
                tokens.push(&word[start..end]);
                start = end;
            }
        }
        tokens.push(&word[start..]);
    }
    tokens
}

fn ends_with_any(token: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|s| token.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(province: &str, city: &str, district: &str) -> Region {
        Region {
            province: province.to_string(),
            city: city.to_string(),
            district: district.to_string(),
        }
    }

    #[test]
    fn test_tokenize_suffixes() {
        assert_eq!(tokenize("广东省深圳市南山区"), vec!["广东省", "深圳市", "南山区"]);
        assert_eq!(tokenize("内蒙古自治区 呼和浩特市"), vec!["内蒙古自治区", "呼和浩特市"]);
        assert_eq!(tokenize("美国"), vec!["美国"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_province_city_district() {
        assert_eq!(
            split_region("广东省深圳市南山区"),
            region("广东省", "深圳市", "南山区")
        );
        assert_eq!(
            split_region("中国 浙江省 杭州市 西湖区 文三路"),
            region("浙江省", "杭州市", "西湖区文三路")
        );
    }

    #[test]
    fn test_autonomous_region() {
        assert_eq!(
            split_region("新疆维吾尔自治区乌鲁木齐市"),
            region("新疆维吾尔自治区", "乌鲁木齐市", "")
        );
        assert_eq!(
            split_region("香港特别行政区"),
            region("香港特别行政区", "", "")
        );
    }

    #[test]
    fn test_municipality() {
        assert_eq!(split_region("北京市朝阳区"), region("北京市", "朝阳区", ""));
    }

    #[test]
    fn test_province_without_city_suffix() {
        assert_eq!(split_region("广东省 某某"), region("广东省", "某某", ""));
    }

    #[test]
    fn test_fallback_positional() {
        assert_eq!(
            split_region("美国 加利福尼亚州 圣克拉拉"),
            region("美国", "加利福尼亚州", "圣克拉拉")
        );
        assert_eq!(split_region("Test Country"), region("Test", "Country", ""));
        assert_eq!(split_region("日本"), region("日本", "", ""));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(split_region("CZ88.NET"), Region::default());
        assert_eq!(split_region(" IANA 保留地址"), region("保留地址", "", ""));
        assert_eq!(isp_of(" CZ88.NET"), "");
    }

    #[test]
    fn test_isp_vocabulary() {
        assert_eq!(isp_of("电信ADSL"), "中国电信");
        assert_eq!(isp_of("联通"), "中国联通");
        assert_eq!(isp_of("阿里云BGP数据中心"), "阿里云");
        assert_eq!(isp_of("Test ISP"), "Test ISP");
        assert_eq!(isp_of(""), "");
    }

    #[test]
    fn test_country() {
        assert_eq!(country_of("广东省深圳市"), "中国");
        assert_eq!(country_of("中国"), "中国");
        assert_eq!(country_of("内蒙古包头市"), "中国");
        assert_eq!(country_of("美国"), "美国");
        assert_eq!(country_of("Test Country"), "Test Country");
    }

    #[test]
    fn test_from_raw() {
        let info = LocationInfo::from_raw(Ipv4Addr::new(1, 2, 3, 4), "广东省深圳市", "电信");
        assert_eq!(info.country, "中国");
        assert_eq!(info.province(), "广东省");
        assert_eq!(info.city(), "深圳市");
        assert_eq!(info.district(), "");
        assert_eq!(info.isp, "中国电信");
        assert_eq!(info.ip, "1.2.3.4");
        assert_eq!(info.full(" "), "中国 广东省 深圳市");
    }

    #[test]
    fn test_province_falls_back_to_country() {
        let info = LocationInfo::from_raw(Ipv4Addr::new(1, 1, 1, 1), "CZ88.NET", "");
        assert_eq!(info.country, "");
        assert_eq!(info.province, "");
        assert_eq!(info.full("/"), UNKNOWN);
    }

    #[test]
    fn test_local() {
        let info = LocationInfo::local("10.0.0.1");
        assert_eq!(info.country, LOCAL);
        assert_eq!(info.isp, PRIVATE_NETWORK);
        assert_eq!(info.full("-"), "local-local-local-local");
    }

    #[test]
    fn test_json_fields() {
        let info = LocationInfo::local("127.0.0.1");
        let value = serde_json::to_value(&info).unwrap();
        for key in ["country", "province", "city", "district", "isp", "ip"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["ip"], "127.0.0.1");
    }
}
