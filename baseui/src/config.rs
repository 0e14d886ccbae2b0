use std::fs;

use anyhow::anyhow;
use common::node::Node;
use pubsub::PubSub;
use serde::Deserialize;
use simulator::SimulatorNodeConfig;
use slam::TsdGridSlamNodeConfig;

#[derive(Clone, Deserialize, Default)]
pub struct Config {
    pub settings: Settings,

    pub nodes: Vec<NodeConfig>,
}

#[derive(Clone, Deserialize, Default)]
pub struct Settings {
    headless: bool,
}

#[derive(Clone, Deserialize)]
pub enum NodeConfig {
    Simulator(SimulatorNodeConfig),
    TsdGridSlam(TsdGridSlamNodeConfig),
}

impl NodeConfig {
    fn instantiate(&self, pubsub: &mut PubSub) -> Box<dyn Node> {
        use NodeConfig::*;
        match self {
            Simulator(c) => c.instantiate(pubsub),
            TsdGridSlam(c) => c.instantiate(pubsub),
        }
    }
}

impl Config {
    pub fn from_file(path: &String) -> anyhow::Result<Self> {
        // read file contents
        let contents = fs::read_to_string(path)?;

        serde_yaml::from_str(&contents).map_err(|e| anyhow!(e))
    }

    pub fn instantiate_nodes(&self, pubsub: &mut PubSub) -> Vec<Box<dyn Node>> {
        self.nodes
            .iter()
            .map(|config| config.instantiate(pubsub))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grid_slam_preset_parses_and_instantiates() {
        let source = include_str!("../../config/grid_slam.yaml");
        let config: Config = serde_yaml::from_str(source).expect("preset should parse");
        assert_eq!(config.nodes.len(), 2);

        let mut pubsub = PubSub::new();
        let nodes = config.instantiate_nodes(&mut pubsub);
        assert_eq!(nodes.len(), 2);
    }
}
