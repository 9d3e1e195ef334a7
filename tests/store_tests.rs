use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::codec::FramedRead;

use qlens::config::StoreConfig;
use qlens::store::protocol::{RespCodec, RespValue};
use qlens::store::{RespStore, StoreClient, StoreError, StoreValueType};

fn bulk(s: &str) -> String {
    format!("${}\r\n{}\r\n", s.len(), s)
}

fn array(items: &[&str]) -> String {
    let mut out = format!("*{}\r\n", items.len());
    for item in items {
        out.push_str(&bulk(item));
    }
    out
}

/// Canned replies of the scripted server
fn reply_to(args: &[String]) -> Vec<u8> {
    let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or("");
    let text = match arg(0).to_uppercase().as_str() {
        "SCAN" if arg(3) == "bin:*" => {
            let mut out = format!("*2\r\n{}*2\r\n", bulk("0")).into_bytes();
            out.extend_from_slice(b"$6\r\nbin:\xff\xfe\r\n");
            out.extend_from_slice(bulk("bin:ok:wait").as_bytes());
            return out;
        }
        "SCAN" if arg(1) == "0" => format!("*2\r\n{}{}", bulk("7"), array(&["bull:a:wait", "bull:b:wait"])),
        "SCAN" => format!("*2\r\n{}{}", bulk("0"), array(&["bull:b:wait"])),
        "TYPE" => "+list\r\n".to_string(),
        "LLEN" => ":3\r\n".to_string(),
        "MEMORY" if arg(2) == "bull:a:wait" => ":128\r\n".to_string(),
        "MEMORY" => "$-1\r\n".to_string(),
        "HGETALL" => array(&["name", "send-email", "data", "{}"]),
        "ZRANGE" => array(&["a", "1.5"]),
        "INFO" => bulk("# Clients\r\nconnected_clients:3\r\n"),
        "GET" => "-ERR boom\r\n".to_string(),
        _ => "+OK\r\n".to_string(),
    };
    text.into_bytes()
}

/// Accepts connections forever, recording every command it sees.
async fn scripted_server() -> (StoreConfig, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            let log = log.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut frames = FramedRead::new(read, RespCodec::new());
                while let Some(Ok(frame)) = frames.next().await {
                    let args: Vec<String> = frame
                        .into_array()
                        .unwrap_or_default()
                        .iter()
                        .filter_map(RespValue::as_text)
                        .collect();
                    log.lock().push(args.join(" "));
                    if write.write_all(&reply_to(&args)).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    let config = StoreConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..StoreConfig::default()
    };
    (config, seen)
}

#[cfg(test)]
mod store_tests {
    use super::*;

    mod features {
        use super::*;

        #[tokio::test]
        async fn test_scan_follows_cursor_and_dedups() {
            let (config, seen) = scripted_server().await;
            let store = RespStore::new(config);

            let keys = store.scan("bull:*").await.unwrap();
            assert_eq!(keys, vec!["bull:a:wait".to_string(), "bull:b:wait".to_string()]);

            let log = seen.lock().clone();
            assert_eq!(log[0], "SCAN 0 MATCH bull:* COUNT 1000");
            assert_eq!(log[1], "SCAN 7 MATCH bull:* COUNT 1000");
        }

        #[tokio::test]
        async fn test_scan_skips_binary_keys() {
            let (config, _seen) = scripted_server().await;
            let store = RespStore::new(config);

            let keys = store.scan("bin:*").await.unwrap();
            assert_eq!(keys, vec!["bin:ok:wait".to_string()]);
        }

        #[tokio::test]
        async fn test_typed_replies() {
            let (config, _seen) = scripted_server().await;
            let store = RespStore::new(config);

            assert_eq!(store.key_type("bull:a:wait").await.unwrap(), StoreValueType::List);
            assert_eq!(store.llen("bull:a:wait").await.unwrap(), 3);
            assert_eq!(store.memory_usage("bull:a:wait").await.unwrap(), Some(128));
            assert_eq!(store.memory_usage("bull:gone").await.unwrap(), None);
            assert_eq!(
                store.hgetall("bull:a:1").await.unwrap(),
                vec![
                    ("name".to_string(), "send-email".to_string()),
                    ("data".to_string(), "{}".to_string()),
                ]
            );
            assert_eq!(
                store.zrange_with_scores("bull:a:delayed", 0, 49).await.unwrap(),
                vec![("a".to_string(), 1.5)]
            );
            assert!(store.info().await.unwrap().contains("connected_clients:3"));
        }

        #[tokio::test]
        async fn test_pipelined_calls_share_connection() {
            let (config, _seen) = scripted_server().await;
            let store = Arc::new(RespStore::new(config));

            let calls = (0..20).map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.llen("bull:a:wait").await })
            });
            for call in futures_util::future::join_all(calls).await {
                assert_eq!(call.unwrap().unwrap(), 3);
            }
        }

        #[tokio::test]
        async fn test_auth_and_select_on_connect() {
            let (mut config, seen) = scripted_server().await;
            config.password = Some("secret".to_string());
            config.db = 2;
            let store = RespStore::new(config);

            store.llen("bull:a:wait").await.unwrap();
            let log = seen.lock().clone();
            assert_eq!(log, vec!["AUTH secret", "SELECT 2", "LLEN bull:a:wait"]);
        }
    }

    mod failures {
        use super::*;

        #[tokio::test]
        async fn test_error_reply_is_server_error() {
            let (config, _seen) = scripted_server().await;
            let store = RespStore::new(config);

            let err = store.get("bull:a:id").await.unwrap_err();
            assert_eq!(err, StoreError::Server("ERR boom".to_string()));
            // Connection stays usable after an error reply
            assert_eq!(store.llen("bull:a:wait").await.unwrap(), 3);
        }

        #[tokio::test]
        async fn test_unreachable_store_is_connection_error() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            drop(listener);

            let store = RespStore::new(StoreConfig {
                port,
                ..StoreConfig::default()
            });
            let err = store.scan("bull:*").await.unwrap_err();
            assert!(matches!(err, StoreError::Connection(_)), "got {:?}", err);
        }
    }
}
