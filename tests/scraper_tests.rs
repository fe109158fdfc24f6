// NetDevScraper tests: /proc/net/dev fixture, substring matching, parse failures

mod common;

use netsampler::error::ScrapeError;
use netsampler::scraper::{NetDevScraper, NetworkStats, NetworkStatsScraper};

fn scrape_fixture(interface: &str) -> Result<NetworkStats, ScrapeError> {
    let mut file = std::fs::File::open(common::net_dev_fixture()).expect("fixture");
    NetDevScraper::new(interface).scrape(&mut file)
}

#[test]
fn scrape_picks_received_and_transmitted_columns() {
    let mut blob = "eth0: 100 0 0 0 0 0 0 0 0 200 0 0 0 0 0 0 0\n".as_bytes();
    let stats = NetDevScraper::new("eth0").scrape(&mut blob).unwrap();
    assert_eq!(
        stats,
        NetworkStats {
            received_bytes: 100,
            transmitted_bytes: 200
        }
    );
}

#[test]
fn scrape_default_interface_is_eth0() {
    let stats = scrape_fixture("").unwrap();
    assert_eq!(stats.received_bytes, 3_862_937_603);
    assert_eq!(stats.transmitted_bytes, 281_882_792);
}

#[test]
fn scrape_fixture_interfaces() {
    let eth1 = scrape_fixture("eth1").unwrap();
    assert_eq!(eth1.received_bytes, 2_247_549_264);
    assert_eq!(eth1.transmitted_bytes, 255_567_044);

    let lo = scrape_fixture("lo").unwrap();
    assert_eq!(lo.received_bytes, 1_982_736);
    assert_eq!(lo.transmitted_bytes, 1_982_736);
}

#[test]
fn scrape_uses_substring_match_and_first_line_wins() {
    let eth01 = scrape_fixture("eth01").unwrap();
    assert_eq!(eth01.received_bytes, 777);
    assert_eq!(eth01.transmitted_bytes, 888);

    let mut blob = "veth0: 1 0 0 0 0 0 0 0 0 2\n  eth0: 10 0 0 0 0 0 0 0 0 20\n".as_bytes();
    let stats = NetDevScraper::new("eth0").scrape(&mut blob).unwrap();
    assert_eq!(stats.received_bytes, 1, "veth0: contains eth0: and comes first");
}

#[test]
fn scrape_tolerates_non_utf8_interface_lines() {
    let mut blob: &[u8] =
        b"  wl\xff0: 1 0 0 0 0 0 0 0 0 2\n  eth0: 100 0 0 0 0 0 0 0 0 200\n";
    let stats = NetDevScraper::new("eth0").scrape(&mut blob).unwrap();
    assert_eq!(
        stats,
        NetworkStats {
            received_bytes: 100,
            transmitted_bytes: 200
        }
    );
}

#[test]
fn scrape_missing_interface_is_parse_error() {
    let mut blob = "eth0: 100 0 0 0 0 0 0 0 0 200\n".as_bytes();
    let err = NetDevScraper::new("eth1").scrape(&mut blob).unwrap_err();
    assert!(matches!(err, ScrapeError::InterfaceNotFound { ref interface } if interface == "eth1"));
    assert!(err.to_string().contains("eth1"));
}

#[test]
fn scrape_non_numeric_field_is_parse_error() {
    let mut blob = "eth0: 100 0 0 0 0 0 0 0 0 lots\n".as_bytes();
    let err = NetDevScraper::new("eth0").scrape(&mut blob).unwrap_err();
    match err {
        ScrapeError::InvalidField { index, value, .. } => {
            assert_eq!(index, 9);
            assert_eq!(value, "lots");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn scrape_negative_field_is_parse_error() {
    let mut blob = "eth0: -5 0 0 0 0 0 0 0 0 200\n".as_bytes();
    let err = NetDevScraper::new("eth0").scrape(&mut blob).unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidField { index: 1, .. }));
}

#[test]
fn scrape_empty_input_is_not_found() {
    let mut blob = "".as_bytes();
    let err = NetDevScraper::new("eth0").scrape(&mut blob).unwrap_err();
    assert!(matches!(err, ScrapeError::InterfaceNotFound { .. }));
}
