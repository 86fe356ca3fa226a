//! Path-style S3 client (MinIO compatible)

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};

use super::sigv4::{self, Credentials, SigningRequest};
use super::{ObjectInfo, ObjectStore, StorageBackend, StorageError};
use crate::config::StorageConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct S3ObjectStore {
    client: reqwest::Client,
    base_url: String,
    host: String,
    credentials: Credentials,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let host = config
            .endpoint
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();
        let scheme = if config.secure { "https" } else { "http" };

        Ok(Self {
            client,
            base_url: format!("{}://{}", scheme, host),
            host,
            credentials: Credentials {
                access_key: config.access_key.clone(),
                secret_key: config.secret_key.clone(),
                region: config.region.clone(),
            },
        })
    }

    async fn send(
        &self,
        method: Method,
        bucket: &str,
        key: Option<&str>,
        query: &[(&str, &str)],
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, StorageError> {
        let uri = sigv4::canonical_uri(bucket, key);
        let query = sigv4::canonical_query(query);
        let payload_hash = sigv4::sha256_hex(&body);
        let amz_date = sigv4::amz_date(&Utc::now());

        let signed = [
            ("host", self.host.as_str()),
            ("x-amz-content-sha256", payload_hash.as_str()),
            ("x-amz-date", amz_date.as_str()),
        ];
        let authorization = sigv4::authorization(
            &self.credentials,
            &SigningRequest {
                method: method.as_str(),
                canonical_uri: &uri,
                canonical_query: &query,
                headers: &signed,
                payload_hash: &payload_hash,
            },
            &amz_date,
        );

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, uri)
        } else {
            format!("{}{}?{}", self.base_url, uri, query)
        };

        let mut request = self
            .client
            .request(method, url)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date)
            .header("authorization", authorization);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }

        Ok(request.body(body).send().await?)
    }

    async fn error_for(response: reqwest::Response) -> StorageError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = xml_value(&body, "Message")
            .or_else(|| xml_value(&body, "Code"))
            .map(unescape)
            .unwrap_or(body);
        StorageError::Status { status, message }
    }
}

#[axum::async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::S3
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let head = self.send(Method::HEAD, bucket, None, &[], Vec::new(), None).await?;
        match head.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                let created = self.send(Method::PUT, bucket, None, &[], Vec::new(), None).await?;
                if created.status().is_success() {
                    tracing::info!("Created bucket: {}", bucket);
                    Ok(())
                } else {
                    Err(Self::error_for(created).await)
                }
            }
            _ => Err(Self::error_for(head).await),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .send(Method::PUT, bucket, Some(key), &[], data, Some(content_type))
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_for(response).await)
        }
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.send(Method::GET, bucket, Some(key), &[], Vec::new(), None).await?;
        match response.status() {
            s if s.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => Err(Self::error_for(response).await),
        }
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut query = vec![("list-type", "2"), ("prefix", prefix)];
            if let Some(t) = token.as_deref() {
                query.push(("continuation-token", t));
            }

            let response = self.send(Method::GET, bucket, None, &query, Vec::new(), None).await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(StorageError::BucketNotFound(bucket.to_string()));
            }
            if !response.status().is_success() {
                return Err(Self::error_for(response).await);
            }

            let page = parse_list_objects(&response.text().await?)?;
            objects.extend(page.objects);
            match page.next_token {
                Some(next) if page.truncated => token = Some(next),
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let response = self
            .send(Method::DELETE, bucket, Some(key), &[], Vec::new(), None)
            .await?;
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::error_for(response).await)
        }
    }
}

/// Text of the first `<tag>...</tag>` in `xml`
fn xml_value<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

/// Every `<tag>...</tag>` block body in `xml`
fn xml_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut rest = xml;
    while let Some(pos) = rest.find(&open) {
        let body_start = pos + open.len();
        let Some(len) = rest[body_start..].find(&close) else {
            break;
        };
        blocks.push(&rest[body_start..body_start + len]);
        rest = &rest[body_start + len + close.len()..];
    }
    blocks
}

fn entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = match name.strip_prefix('#')? {
                hex if hex.starts_with(['x', 'X']) => u32::from_str_radix(&hex[1..], 16).ok()?,
                dec => dec.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Decode predefined and numeric character references; unknown ones are kept as-is
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').and_then(|end| entity(&tail[1..end]).map(|c| (c, end))) {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

struct ListPage {
    objects: Vec<ObjectInfo>,
    truncated: bool,
    next_token: Option<String>,
}

/// `ListObjectsV2` response body
fn parse_list_objects(xml: &str) -> Result<ListPage, StorageError> {
    if !xml.contains("<ListBucketResult") {
        return Err(StorageError::InvalidResponse("expected ListBucketResult".to_string()));
    }

    let objects = xml_blocks(xml, "Contents")
        .into_iter()
        .filter_map(|block| {
            let key = unescape(xml_value(block, "Key")?);
            let size = xml_value(block, "Size").and_then(|s| s.parse().ok()).unwrap_or(0);
            let last_modified = xml_value(block, "LastModified")
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc));
            Some(ObjectInfo { key, size, last_modified })
        })
        .collect();

    Ok(ListPage {
        objects,
        truncated: xml_value(xml, "IsTruncated") == Some("true"),
        next_token: xml_value(xml, "NextContinuationToken").map(unescape),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>datasets</Name>
  <Prefix>meta/</Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>1ueGcxLPRx1Tr/XYExHnhbYLgveDs2J/wm36Hy4vbOwM=</NextContinuationToken>
  <Contents>
    <Key>meta/a&amp;b.json</Key>
    <LastModified>2024-05-01T10:00:00.000Z</LastModified>
    <ETag>&quot;abc&quot;</ETag>
    <Size>120</Size>
  </Contents>
  <Contents>
    <Key>meta/c.json</Key>
    <Size>7</Size>
  </Contents>
</ListBucketResult>"#;

    #[test]
    fn test_parse_list_page() {
        let page = parse_list_objects(LIST_PAGE).unwrap();
        assert_eq!(page.objects.len(), 2);
        assert_eq!(page.objects[0].key, "meta/a&b.json");
        assert_eq!(page.objects[0].size, 120);
        assert!(page.objects[0].last_modified.is_some());
        assert_eq!(page.objects[1].last_modified, None);
        assert!(page.truncated);
        assert_eq!(
            page.next_token.as_deref(),
            Some("1ueGcxLPRx1Tr/XYExHnhbYLgveDs2J/wm36Hy4vbOwM=")
        );
    }

    #[test]
    fn test_unescape_character_references() {
        assert_eq!(unescape("a&amp;b &lt;c&gt;"), "a&b <c>");
        assert_eq!(unescape("datasets&#x2F;x&#47;y"), "datasets/x/y");
        assert_eq!(unescape("&amp;lt;"), "&lt;");
        assert_eq!(unescape("R&D; &bogus; &#xZZ; 5 & 6"), "R&D; &bogus; &#xZZ; 5 & 6");
    }

    #[test]
    fn test_reject_error_document() {
        let xml = "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>";
        assert!(parse_list_objects(xml).is_err());
        assert_eq!(xml_value(xml, "Message"), Some("Access Denied"));
    }

    #[test]
    fn test_endpoint_normalization() {
        let config = StorageConfig {
            endpoint: "http://minio:9000/".to_string(),
            secure: false,
            ..StorageConfig::default()
        };
        let store = S3ObjectStore::new(&config).unwrap();
        assert_eq!(store.host, "minio:9000");
        assert_eq!(store.base_url, "http://minio:9000");
    }
}
