use futures_util::StreamExt;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::{Duration, sleep},
};
use zhipu_ox::{Message, ResolvedConfig, Zhipu, ZhipuRequestError};

/// Read one request (headers plus `content-length` bytes of body) off the socket
async fn read_request(socket: &mut TcpStream) {
    let mut buffer = Vec::new();
    loop {
        let mut chunk = [0u8; 1024];
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            let header_end = pos + 4;
            let headers_str = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
            let content_length = headers_str
                .lines()
                .find_map(|line| line.strip_prefix("content-length: "))
                .and_then(|len| len.trim().parse::<usize>().ok())
                .unwrap_or(0);

            let mut body_len = buffer.len() - header_end;
            while body_len < content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                body_len += n;
            }
            return;
        }
    }
}

/// Serve one request, writing `body_parts` as separate HTTP chunks with a pause between them
async fn serve_chunked(listener: TcpListener, body_parts: Vec<Vec<u8>>) {
    let (mut socket, _) = listener.accept().await.unwrap();
    read_request(&mut socket).await;

    let response_head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
    socket.write_all(response_head.as_bytes()).await.unwrap();

    for part in body_parts {
        let mut framed = format!("{:x}\r\n", part.len()).into_bytes();
        framed.extend_from_slice(&part);
        framed.extend_from_slice(b"\r\n");
        socket.write_all(&framed).await.unwrap();
        socket.flush().await.unwrap();
        sleep(Duration::from_millis(20)).await;
    }
    socket.write_all(b"0\r\n\r\n").await.unwrap();
}

fn client_at(addr: std::net::SocketAddr) -> Zhipu {
    Zhipu::with_resolver(
        ResolvedConfig::builder()
            .api_key("test-key")
            .base_url(format!("http://{addr}/api/paas/v4/chat/completions"))
            .build(),
    )
}

async fn stream_from(body_parts: Vec<Vec<u8>>) -> Vec<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_chunked(listener, body_parts));

    let client = client_at(addr);

    let mut stream = client.stream(&[Message::user("ping")]);
    let mut fragments = Vec::new();
    while let Some(item) = stream.next().await {
        fragments.push(item.expect("streaming should not fail on split chunks"));
    }

    server.await.unwrap();
    fragments
}

#[tokio::test]
async fn streaming_should_survive_line_split_mid_json() {
    let fragments = stream_from(vec![
        b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel".to_vec(),
        b"lo\"}}]}\n".to_vec(),
    ])
    .await;

    assert_eq!(fragments, vec!["Hello"]);
}

#[tokio::test]
async fn streaming_should_survive_utf8_split_across_chunks() {
    let line = "data: {\"choices\":[{\"delta\":{\"content\":\"早上好 👋\"}}]}\n\ndata: [DONE]\n\n";
    let bytes = line.as_bytes();
    // split inside the three-byte "早" and inside the four-byte emoji
    let first_split = line.find('早').unwrap() + 1;
    let second_split = line.find('👋').unwrap() + 2;

    let fragments = stream_from(vec![
        bytes[..first_split].to_vec(),
        bytes[first_split..second_split].to_vec(),
        bytes[second_split..].to_vec(),
    ])
    .await;

    assert_eq!(fragments, vec!["早上好 👋"]);
}

#[tokio::test]
async fn truncated_error_body_falls_back_to_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        // promises 100 bytes, sends 9, then hangs up
        let response = "HTTP/1.1 500 Internal Server Error\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"error\":";
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
    });

    let results: Vec<_> = client_at(addr).stream(&[Message::user("ping")]).collect().await;
    server.await.unwrap();

    assert_eq!(results.len(), 1);
    match &results[0] {
        Err(ZhipuRequestError::Api { status, message }) => {
            assert_eq!(*status, 500);
            assert_eq!(message, "request failed: 500");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
