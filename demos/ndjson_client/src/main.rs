//! ストリーミング NDJSON クライアントの例
//!
//! 使い方:
//!   cargo run -p ndjson_client -- "http://127.0.0.1:2001/chunked-response?numChunks=4&entriesPerChunk=3"

use tokio_ndjson::Client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = noargs::raw_args();
    args.metadata_mut().app_name = "ndjson_client";

    noargs::HELP_FLAG.take_help(&mut args);

    let url: String = noargs::arg("<URL>")
        .doc("URL to stream (e.g., http://127.0.0.1:2001/chunked-response)")
        .take(&mut args)
        .then(|a| Ok::<_, String>(a.value().to_string()))
        .map_err(|e| format!("{:?}", e))?;

    if let Some(help) = args.finish().map_err(|e| format!("{:?}", e))? {
        print!("{}", help);
        return Ok(());
    }

    let client = Client::new();
    let mut stream = client.get(&url).await?;

    println!("transport: {}", stream.transport());

    while let Some(batch) = stream.next_batch().await? {
        for result in batch {
            match result {
                Ok(record) => println!("#{}: {}", record.ordinal(), record.as_str()),
                Err(failure) => eprintln!("skipped #{}: {}", failure.ordinal(), failure),
            }
        }
    }

    if let Some(completion) = stream.completion() {
        println!(
            "done: status={} transport={}",
            completion.status_code, completion.transport
        );
    }

    Ok(())
}
