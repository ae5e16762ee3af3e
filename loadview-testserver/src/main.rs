use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:8080".parse()?;
    let mut config = loadview_testserver::RunnerConfig {
        tick: Duration::from_secs(1),
        ..Default::default()
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:8080")
                })?;
                bind_addr = addr.parse()?;
            }
            "--tick-ms" => {
                let ms = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--tick-ms requires a number of milliseconds"))?;
                config.tick = Duration::from_millis(ms.parse()?);
            }
            "-h" | "--help" => {
                eprintln!(
                    "loadview-testserver\n\nUSAGE:\n  loadview-testserver [--bind 127.0.0.1:8080] [--tick-ms 1000]\n\nEmits synthetic result frames on /ws for every POST /start-test.\n\nOUTPUT:\n  Prints HTTP_URL=<url> and WS_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let stats = loadview_testserver::RunnerStats::default();
    let (app, _frames_tx) = loadview_testserver::router(stats, config);

    println!("HTTP_URL=http://{addr}");
    println!("WS_URL=ws://{addr}{}", loadview_testserver::PATH_WS);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
