use std::env;
use std::error::Error;
use std::io::{self, Write};

fn main() {
    if let Err(err) = run() {
        eprintln!("mock podman error: {err}");
        std::process::exit(125);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err("missing subcommand".into());
    }

    match args[1].as_str() {
        "ps" => handle_ps(&args[2..]),
        "image" => handle_image(&args[2..]),
        other => Err(format!("unsupported podman command: {other}").into()),
    }
}

fn handle_ps(args: &[String]) -> Result<(), Box<dyn Error>> {
    if !args.windows(2).any(|w| w[0] == "--format" && w[1] == "json") {
        return Err("mock ps only supports --format json".into());
    }
    println!("{PS_OUTPUT}");
    io::stdout().flush()?;
    Ok(())
}

fn handle_image(args: &[String]) -> Result<(), Box<dyn Error>> {
    match args {
        [cmd, image] if cmd == "inspect" => match inspect_output(image) {
            Some(json) => {
                println!("{json}");
                io::stdout().flush()?;
                Ok(())
            }
            None => Err(format!("{image}: image not known").into()),
        },
        _ => Err(format!("unsupported image command: {}", args.join(" ")).into()),
    }
}

fn inspect_output(image: &str) -> Option<&'static str> {
    match image {
        "docker.io/library/nginx:1.25.3" | "nginx:1.25.3" => Some(NGINX_INSPECT),
        "docker.io/library/redis:latest" | "redis:latest" => Some(REDIS_INSPECT),
        "localhost/myapp:dev" => Some(LOCAL_INSPECT),
        _ => None,
    }
}

const PS_OUTPUT: &str = r#"[
  {
    "Id": "1f2e3d4c5b6a",
    "Names": ["web"],
    "Image": "docker.io/library/nginx:1.25.3",
    "Labels": {
      "com.docker.compose.project": "stack",
      "com.docker.compose.service": "web"
    }
  },
  {
    "Id": "a6b5c4d3e2f1",
    "Names": ["cache"],
    "Image": "docker.io/library/redis:latest",
    "Labels": {
      "io.podman.compose.project": "stack",
      "io.podman.compose.service": "cache"
    }
  },
  {
    "Id": "0a0b0c0d0e0f",
    "Names": ["myapp"],
    "Image": "localhost/myapp:dev",
    "Labels": null
  }
]"#;

const NGINX_INSPECT: &str = r#"[
  {
    "Id": "sha256:nginximage",
    "Digest": "sha256:1111",
    "RepoDigests": ["docker.io/library/nginx@sha256:1111"],
    "Labels": {"org.opencontainers.image.version": "1.25.3"}
  }
]"#;

const REDIS_INSPECT: &str = r#"[
  {
    "Id": "sha256:redisimage",
    "Digest": "sha256:2222",
    "RepoDigests": ["docker.io/library/redis@sha256:2222"],
    "Config": {"Labels": {"org.opencontainers.image.version": "7.2.4"}}
  }
]"#;

const LOCAL_INSPECT: &str = r#"[
  {
    "Id": "sha256:localimage",
    "RepoDigests": [],
    "Labels": null
  }
]"#;
