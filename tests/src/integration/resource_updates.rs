//! # Routes Follow Resource Changes
//!
//! The route store watches the resource cache; brokers pick up new
//! releases, environment data and deployments without restarting.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use kf_04_orchestrator::Receiver;
    use kf_05_durable_transport::InMemoryTransport;
    use shared_types::{Component, ErrorKind, Val};
    use std::sync::Arc;
    use std::time::Duration;

    const ATTEMPTS: usize = 100;

    /// Pause between attempts while the store catches up.
    async fn settle(attempt: usize) {
        assert!(attempt < ATTEMPTS, "resource change not observed within 2s");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_new_release_changes_genesis_routes() {
        let cache = resources();
        let broker =
            TestBroker::start("b1", cache.clone(), Arc::new(InMemoryTransport::new())).await;
        let mut cart = broker.connect("cart", CART_HASH, "r1", true).await;

        let err = broker
            .service
            .send_and_wait(ingress("b1", "GET", "/basket/1"), Receiver::HttpServer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RouteNotFound);

        cache.put_release_manifest(release_manifest(2, "basket"));
        for attempt in 0.. {
            let routed = broker
                .service
                .send_and_wait(ingress("b1", "GET", "/basket/1"), Receiver::HttpServer)
                .await;
            if routed.is_ok() {
                break;
            }
            settle(attempt).await;
        }

        let matched = next_delivery(&mut cart).await;
        assert_eq!(matched.event.path(), "/basket/1");
    }

    #[tokio::test]
    async fn test_environment_change_reaches_context_routes() {
        let cache = resources();
        let broker =
            TestBroker::start("b1", cache.clone(), Arc::new(InMemoryTransport::new())).await;
        let mut cart = broker.connect("cart", CART_HASH, "r1", true).await;

        let mut env = environment(2, "cart");
        env.data = env.data.with_var("region", "ap");
        cache.put_environment(env);

        let checkout = Component::new("checkout", CHECKOUT_HASH)
            .with_id("r1")
            .with_broker("b1");
        for attempt in 0.. {
            let mut evt = ingress("b1", "GET", "/cart/2");
            evt.source = Some(checkout.clone());
            evt.context = Some(shop_context());
            broker
                .service
                .send_and_wait(evt, Receiver::GrpcServer)
                .await
                .unwrap();
            let matched = next_delivery(&mut cart).await;
            if matched.env.get("region") == Some(&Val::from("ap")) {
                break;
            }
            settle(attempt).await;
        }
    }

    #[tokio::test]
    async fn test_removed_deployment_refuses_subscriptions() {
        let cache = resources();
        let broker =
            TestBroker::start("b1", cache.clone(), Arc::new(InMemoryTransport::new())).await;

        cache.delete_app_deployment("shop");
        let (sink, _rx) = kf_03_subscriptions::ChannelSink::new(1);
        let sink = Arc::new(sink);
        let meta = meta_for(Component::new("cart", CART_HASH).with_id("r9"));
        for attempt in 0.. {
            match broker
                .service
                .subscribe(&meta, sink.clone(), true, &broker.scope)
                .await
            {
                Ok(_) => {
                    broker.service.registry().cancel(&meta.component, None);
                }
                Err(e) => {
                    assert_eq!(e.kind(), ErrorKind::Unauthorized);
                    break;
                }
            }
            settle(attempt).await;
        }
    }
}
