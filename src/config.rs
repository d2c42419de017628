use clap::Parser;

/// Runtime configuration. Every flag can also be set through the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Detects catalog products in uploaded images",
    long_about = None
)]
pub struct Config {
    /// Address the HTTP listener binds to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// ONNX export of the detection model
    #[arg(long, env = "MODEL_PATH", default_value = "best.onnx")]
    pub model_path: String,

    /// Side of the square model input, in pixels
    #[arg(
        long,
        env = "INPUT_SIZE",
        default_value_t = 640,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub input_size: u32,

    /// Detections must score strictly above this value
    #[arg(long, env = "CONFIDENCE_THRESHOLD", default_value_t = 0.5)]
    pub confidence_threshold: f32,

    #[arg(long, env = "INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: "best.onnx".to_string(),
            input_size: 640,
            confidence_threshold: 0.5,
            intra_threads: 4,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_all_interfaces() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.model_path, "best.onnx");
        assert_eq!(config.confidence_threshold, 0.5);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "product-detection-rs",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--model-path",
            "models/cart.onnx",
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.model_path, "models/cart.onnx");
    }

    #[test]
    fn rejects_zero_input_size() {
        assert!(Config::try_parse_from(["product-detection-rs", "--input-size", "0"]).is_err());
        let config =
            Config::try_parse_from(["product-detection-rs", "--input-size", "320"]).unwrap();
        assert_eq!(config.input_size, 320);
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(Config::try_parse_from(["product-detection-rs", "--port", "http"]).is_err());
    }
}
