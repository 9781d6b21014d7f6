use std::path::Path;

use tensorflow::{
    Graph, SavedModelBundle, SessionOptions, SessionRunArgs, Tensor,
    DEFAULT_SERVING_SIGNATURE_DEF_KEY,
};

use crate::error::{Result, ServeError};
use crate::preprocess::ImageTensor;
use crate::timer::Timer;

/// Forward pass of a trained image classifier.
pub trait Classifier: Send + Sync {
    /// Probability of each class for the single image in `input`.
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>>;
}

/// Graph endpoint named by the serving signature.
#[derive(Debug, Clone)]
struct Endpoint {
    operation: String,
    index: i32,
}

/// A TensorFlow SavedModel exposing one input and one output through its
/// default serving signature.
pub struct TfClassifier {
    /// TensorFlow model graph
    graph: Graph,

    /// Loaded SavedModel, owns the session
    bundle: SavedModelBundle,

    input: Endpoint,
    output: Endpoint,
}

impl TfClassifier {
    pub fn load(export_dir: &Path) -> Result<Self> {
        let t = Timer::start("Loading model");

        let mut graph = Graph::new();
        let bundle =
            SavedModelBundle::load(&SessionOptions::new(), &["serve"], &mut graph, export_dir)?;

        let signature = bundle
            .meta_graph_def()
            .get_signature(DEFAULT_SERVING_SIGNATURE_DEF_KEY)?;

        let endpoint = |infos: Vec<&tensorflow::TensorInfo>, what: &str| match infos.as_slice() {
            [info] => Ok(Endpoint {
                operation: info.name().name.clone(),
                index: info.name().index,
            }),
            _ => Err(ServeError::Artifact(format!(
                "serving signature must have exactly one {}, found {}",
                what,
                infos.len()
            ))),
        };

        let input = endpoint(signature.inputs().values().collect(), "input")?;
        let output = endpoint(signature.outputs().values().collect(), "output")?;

        // Fail at load time rather than on the first request.
        graph.operation_by_name_required(&input.operation)?;
        graph.operation_by_name_required(&output.operation)?;

        t.stop();

        Ok(TfClassifier {
            graph,
            bundle,
            input,
            output,
        })
    }
}

impl Classifier for TfClassifier {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        let dims: Vec<u64> = input.shape().iter().map(|d| *d as u64).collect();
        let values = input
            .as_slice()
            .ok_or_else(|| ServeError::Tensorflow("input tensor is not contiguous".to_owned()))?;
        let tensor = Tensor::new(&dims).with_values(values)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(
            &self.graph.operation_by_name_required(&self.input.operation)?,
            self.input.index,
            &tensor,
        );
        let token = args.request_fetch(
            &self.graph.operation_by_name_required(&self.output.operation)?,
            self.output.index,
        );

        self.bundle.session.run(&mut args)?;
        let output: Tensor<f32> = args.fetch(token)?;

        Ok(output.to_vec())
    }
}
