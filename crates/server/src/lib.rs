pub mod error;
pub mod middleware;
pub mod routes;

#[cfg(test)]
mod test_support;

pub type DeploymentImpl = local_deployment::LocalDeployment;
